// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests parsing, validation, and type safety properties.

use proptest::prelude::*;
use shipyard::types::*;

mod environment_name_tests {
    use super::*;

    #[test]
    fn valid_dns_name() {
        let name = EnvironmentName::new("prod-eu-1").unwrap();
        assert_eq!(name.as_str(), "prod-eu-1");
        assert_eq!(name.to_string(), "prod-eu-1");
    }

    #[test]
    fn empty_returns_error() {
        assert!(matches!(EnvironmentName::new(""), Err(EnvironmentNameError::Empty)));
    }

    #[test]
    fn too_long_returns_error() {
        let long_name = "a".repeat(64);
        assert!(matches!(
            EnvironmentName::new(&long_name),
            Err(EnvironmentNameError::TooLong)
        ));
    }

    #[test]
    fn valid_63_chars() {
        assert!(EnvironmentName::new(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn hyphen_at_either_end_returns_error() {
        assert!(EnvironmentName::new("-prod").is_err());
        assert!(EnvironmentName::new("prod-").is_err());
    }

    #[test]
    fn uppercase_returns_error() {
        assert!(matches!(
            EnvironmentName::new("Prod"),
            Err(EnvironmentNameError::NotLowercase)
        ));
    }

    #[test]
    fn path_separators_are_rejected() {
        // Names become lock and release file names.
        assert!(EnvironmentName::new("../prod").is_err());
        assert!(EnvironmentName::new("prod/eu").is_err());
    }

    #[test]
    fn deserializes_with_validation() {
        let name: EnvironmentName = serde_json::from_str("\"staging\"").unwrap();
        assert_eq!(name.as_str(), "staging");
        assert!(serde_json::from_str::<EnvironmentName>("\"Staging\"").is_err());
    }
}

mod revision_tests {
    use super::*;

    #[test]
    fn commit_hash_is_accepted() {
        let rev = Revision::new("9fceb02d0ae598e95dc970b74767f19372d61af8").unwrap();
        assert_eq!(rev.as_str(), "9fceb02d0ae598e95dc970b74767f19372d61af8");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let rev = Revision::new("  abc123\n").unwrap();
        assert_eq!(rev.as_str(), "abc123");
    }

    #[test]
    fn blank_returns_error() {
        assert!(matches!(Revision::new("   "), Err(RevisionError::Empty)));
    }

    #[test]
    fn inner_whitespace_returns_error() {
        assert!(matches!(
            Revision::new("abc 123"),
            Err(RevisionError::InvalidChar(' '))
        ));
    }

    #[test]
    fn option_like_revision_returns_error() {
        assert!(matches!(
            Revision::new("--output=/tmp/x.tar"),
            Err(RevisionError::LeadingDash)
        ));
        assert!(Revision::new("-n").is_err());
        assert!(Revision::new("a-b").is_ok());
    }

    #[test]
    fn too_long_returns_error() {
        assert!(matches!(
            Revision::new(&"a".repeat(256)),
            Err(RevisionError::TooLong)
        ));
    }
}

mod artifact_hash_tests {
    use super::*;

    #[test]
    fn identical_bytes_hash_identically() {
        assert_eq!(ArtifactHash::of(b"bundle"), ArtifactHash::of(b"bundle"));
        assert_ne!(ArtifactHash::of(b"bundle"), ArtifactHash::of(b"bundle2"));
    }

    #[test]
    fn wrong_length_returns_error() {
        assert!(matches!(
            ArtifactHash::parse("abc"),
            Err(ArtifactHashError::BadLength(3))
        ));
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert!(serde_json::from_str::<ArtifactHash>("\"not-a-hash\"").is_err());
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn attempt_id_stores_value() {
        let id = AttemptId::new("attempt-1".to_string());
        assert_eq!(id.as_str(), "attempt-1");
        assert_eq!(id.into_inner(), "attempt-1");
    }

    #[test]
    fn generated_ids_are_uuids() {
        let id = BuildId::generate();
        assert_eq!(id.as_str().len(), 36);
        assert_eq!(id.short().len(), 8);
    }
}

proptest! {
    #[test]
    fn valid_environment_names_display_unchanged(name in "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?") {
        let parsed = EnvironmentName::new(&name).unwrap();
        prop_assert_eq!(parsed.to_string(), name);
    }

    #[test]
    fn environment_names_never_contain_separators(name in "\\PC{0,80}") {
        if let Ok(parsed) = EnvironmentName::new(&name) {
            prop_assert!(!parsed.as_str().contains('/'));
            prop_assert!(!parsed.as_str().contains('.'));
            prop_assert!(parsed.as_str().len() <= 63);
        }
    }

    #[test]
    fn hash_parse_accepts_every_digest(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let hash = ArtifactHash::of(&bytes);
        prop_assert_eq!(ArtifactHash::parse(hash.as_str()).unwrap(), hash);
    }
}
