//! Privilege check for backups
//!
//! Sources may name arbitrary absolute paths, some readable only by root, so
//! a backup requires an elevated process. The check sits behind a trait so
//! the pipeline can be exercised with a fixed answer.

/// Answers whether the current process runs with elevated privileges
pub trait PrivilegeCheck: Send + Sync {
    /// Whether the process may read any source path
    fn is_elevated(&self) -> bool;
}

/// Checks the effective user id
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectiveUid;

impl PrivilegeCheck for EffectiveUid {
    #[cfg(unix)]
    fn is_elevated(&self) -> bool {
        nix::unistd::Uid::effective().is_root()
    }

    #[cfg(not(unix))]
    fn is_elevated(&self) -> bool {
        false
    }
}

/// Always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct FixedPrivilege(pub bool);

impl PrivilegeCheck for FixedPrivilege {
    fn is_elevated(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_privilege() {
        assert!(FixedPrivilege(true).is_elevated());
        assert!(!FixedPrivilege(false).is_elevated());
    }

    #[test]
    fn test_effective_uid_matches_nix() {
        assert_eq!(
            EffectiveUid.is_elevated(),
            nix::unistd::geteuid().as_raw() == 0
        );
    }
}
