use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotInitialized,
    NoActiveProject,
    ProjectNotFound,
    EnvironmentNotFound,
    ServerNotFound,
    CommandNotFound,
    PatternNotFound,
    VariableNotFound,
    TaskNotFound,
    LogNotFound,
    ReleaseNotFound,
    AmbiguousRef,
    UnknownStage,
    InvalidStatusTransition,
    NameConflict,
    ValidationError,
    DatabaseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::NoActiveProject => "NO_ACTIVE_PROJECT",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::EnvironmentNotFound => "ENVIRONMENT_NOT_FOUND",
            Self::ServerNotFound => "SERVER_NOT_FOUND",
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
            Self::PatternNotFound => "PATTERN_NOT_FOUND",
            Self::VariableNotFound => "VARIABLE_NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::LogNotFound => "LOG_NOT_FOUND",
            Self::ReleaseNotFound => "RELEASE_NOT_FOUND",
            Self::AmbiguousRef => "AMBIGUOUS_REF",
            Self::UnknownStage => "UNKNOWN_STAGE",
            Self::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
            Self::NameConflict => "NAME_CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ShipwayError {
    pub code: ErrorCode,
    pub message: String,
}

impl ShipwayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            "shipway is not initialized. Run `shipway init` first.",
        )
    }

    pub fn no_active_project() -> Self {
        Self::new(
            ErrorCode::NoActiveProject,
            "No active project. Use `shipway project activate <name>` or `--project <name>`.",
        )
    }

    pub fn project_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::ProjectNotFound,
            format!("Project not found: {reference}"),
        )
    }

    pub fn environment_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::EnvironmentNotFound,
            format!("Environment not found: {reference}"),
        )
    }

    pub fn server_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::ServerNotFound,
            format!("Server not found: {reference}"),
        )
    }

    pub fn command_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::CommandNotFound,
            format!("Command not found: {reference}"),
        )
    }

    pub fn pattern_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::PatternNotFound,
            format!("Pattern not found: {reference}"),
        )
    }

    pub fn variable_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::VariableNotFound,
            format!("Variable not found: {reference}"),
        )
    }

    pub fn task_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {reference}"),
        )
    }

    pub fn log_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::LogNotFound,
            format!("Server log not found: {reference}"),
        )
    }

    pub fn release_not_found(reference: &str) -> Self {
        Self::new(
            ErrorCode::ReleaseNotFound,
            format!("Release not found: {reference}"),
        )
    }

    pub fn ambiguous_ref(reference: &str, candidates: &[String]) -> Self {
        Self::new(
            ErrorCode::AmbiguousRef,
            format!(
                "Ambiguous reference '{}'. Candidates: {}",
                reference,
                candidates.join(", ")
            ),
        )
    }

    pub fn unknown_stage(keyword: &str) -> Self {
        Self::new(
            ErrorCode::UnknownStage,
            format!("Unknown stage keyword: {keyword}"),
        )
    }

    pub fn invalid_transition(from: &str, action: &str) -> Self {
        Self::new(
            ErrorCode::InvalidStatusTransition,
            format!("Invalid status transition: {from} → {action}"),
        )
    }

    pub fn name_conflict(kind: &str, name: &str) -> Self {
        Self::new(
            ErrorCode::NameConflict,
            format!("{kind} with name '{name}' already exists"),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl From<rusqlite::Error> for ShipwayError {
    fn from(e: rusqlite::Error) -> Self {
        Self::database(e.to_string())
    }
}
