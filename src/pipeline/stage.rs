use crate::error::ShipwayError;
use crate::models::PlanKind;

/// The named phases of the two pipelines. Deploy plans run
/// clone → install → activate → purge; build plans run
/// prepare → build → test → result.
///
/// Each stage owns a band of three step codes: before = do − 1,
/// do, after = do + 1. Deploy stages occupy 1–12, build stages 31–42.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clone,
    Install,
    Activate,
    Purge,
    Prepare,
    Build,
    Test,
    Result,
}

impl Stage {
    pub fn parse(keyword: &str) -> Result<Self, ShipwayError> {
        match keyword {
            "clone" => Ok(Self::Clone),
            "install" => Ok(Self::Install),
            "activate" => Ok(Self::Activate),
            "purge" => Ok(Self::Purge),
            "prepare" => Ok(Self::Prepare),
            "build" => Ok(Self::Build),
            "test" => Ok(Self::Test),
            "result" => Ok(Self::Result),
            _ => Err(ShipwayError::unknown_stage(keyword)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clone => "clone",
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Purge => "purge",
            Self::Prepare => "prepare",
            Self::Build => "build",
            Self::Test => "test",
            Self::Result => "result",
        }
    }

    /// Which plan kind the stage belongs to.
    pub fn plan_kind(&self) -> PlanKind {
        match self {
            Self::Clone | Self::Install | Self::Activate | Self::Purge => PlanKind::Deploy,
            Self::Prepare | Self::Build | Self::Test | Self::Result => PlanKind::Build,
        }
    }

    /// The canonical "do" step code of the stage.
    pub fn do_code(&self) -> i64 {
        match self {
            Self::Clone => 2,
            Self::Install => 5,
            Self::Activate => 8,
            Self::Purge => 11,
            Self::Prepare => 32,
            Self::Build => 35,
            Self::Test => 38,
            Self::Result => 41,
        }
    }

    /// The before/after codes surrounding the "do" step, in order.
    pub fn surrounding_codes(&self) -> [i64; 2] {
        [self.do_code() - 1, self.do_code() + 1]
    }

    /// The stages of a plan kind, in execution order.
    pub fn for_kind(kind: PlanKind) -> [Stage; 4] {
        match kind {
            PlanKind::Deploy => [Self::Clone, Self::Install, Self::Activate, Self::Purge],
            PlanKind::Build => [Self::Prepare, Self::Build, Self::Test, Self::Result],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Before,
    Do,
    After,
}

impl Timing {
    pub fn parse(s: &str) -> Result<Self, ShipwayError> {
        match s {
            "before" => Ok(Self::Before),
            "do" => Ok(Self::Do),
            "after" => Ok(Self::After),
            _ => Err(ShipwayError::validation(format!(
                "Timing must be 'before' or 'after', got '{s}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Do => "do",
            Self::After => "after",
        }
    }

    fn offset(&self) -> i64 {
        match self {
            Self::Before => -1,
            Self::Do => 0,
            Self::After => 1,
        }
    }
}

/// Compute the step code for a stage and timing.
pub fn step_code(stage: Stage, timing: Timing) -> i64 {
    stage.do_code() + timing.offset()
}

/// Recover (stage, timing) from a persisted step code.
pub fn from_code(code: i64) -> Option<(Stage, Timing)> {
    for stage in [
        Stage::Clone,
        Stage::Install,
        Stage::Activate,
        Stage::Purge,
        Stage::Prepare,
        Stage::Build,
        Stage::Test,
        Stage::Result,
    ] {
        for timing in [Timing::Before, Timing::Do, Timing::After] {
            if step_code(stage, timing) == code {
                return Some((stage, timing));
            }
        }
    }
    None
}

/// Human label for a step code, e.g. "before install".
pub fn step_label(code: i64) -> String {
    match from_code(code) {
        Some((stage, Timing::Do)) => stage.as_str().to_string(),
        Some((stage, timing)) => format!("{} {}", timing.as_str(), stage.as_str()),
        None => format!("step {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_codes() {
        assert_eq!(Stage::Install.do_code(), 5);
        assert_eq!(Stage::Install.surrounding_codes(), [4, 6]);
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        assert!(Stage::parse("compile").is_err());
        assert!(Stage::parse("").is_err());
    }

    #[test]
    fn test_plan_kind_split() {
        assert_eq!(Stage::Clone.plan_kind(), PlanKind::Deploy);
        assert_eq!(Stage::Purge.plan_kind(), PlanKind::Deploy);
        assert_eq!(Stage::Prepare.plan_kind(), PlanKind::Build);
        assert_eq!(Stage::Result.plan_kind(), PlanKind::Build);
    }

    #[test]
    fn test_code_roundtrip() {
        for stage in Stage::for_kind(PlanKind::Deploy)
            .into_iter()
            .chain(Stage::for_kind(PlanKind::Build))
        {
            for timing in [Timing::Before, Timing::Do, Timing::After] {
                let code = step_code(stage, timing);
                assert_eq!(from_code(code), Some((stage, timing)));
            }
        }
    }

    #[test]
    fn test_bands_do_not_overlap() {
        assert_eq!(step_code(Stage::Purge, Timing::After), 12);
        assert_eq!(step_code(Stage::Prepare, Timing::Before), 31);
        assert_eq!(from_code(13), None);
        assert_eq!(from_code(30), None);
    }

    #[test]
    fn test_step_label() {
        assert_eq!(step_label(4), "before install");
        assert_eq!(step_label(5), "install");
        assert_eq!(step_label(6), "after install");
        assert_eq!(step_label(99), "step 99");
    }
}
