use std::time::Duration;

use saddlery::{Result, SaddleryError};

#[test]
fn test_error_display() {
    let err = SaddleryError::NotFound("/api/products/p9".to_string());
    assert!(err.to_string().contains("/api/products/p9"));

    let err = SaddleryError::InvalidPattern {
        pattern: "(".into(),
        message: "unclosed group".into(),
    };
    assert!(err.to_string().contains("'('"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(SaddleryError::Disposed)
    }
    assert!(returns_error().is_err());
}

#[test]
fn errors_are_cloneable_for_joined_callers() {
    let err = SaddleryError::Api {
        status: 500,
        message: "boom".into(),
    };
    assert_eq!(err.clone(), err);
}

// ============================================================================
// Transient error classification
// ============================================================================

#[test]
fn transient_errors() {
    assert!(SaddleryError::RateLimited { retry_after: None }.is_transient());
    assert!(SaddleryError::Http("connection reset".into()).is_transient());
    for status in [500, 502, 503] {
        assert!(
            SaddleryError::Api {
                status,
                message: String::new()
            }
            .is_transient(),
            "{status} should be transient"
        );
    }
}

#[test]
fn permanent_errors() {
    let permanent = [
        SaddleryError::Unauthorized,
        SaddleryError::NotFound("x".into()),
        SaddleryError::Json("eof".into()),
        SaddleryError::Configuration("bad".into()),
        SaddleryError::CallAborted("panicked".into()),
        SaddleryError::Disposed,
        SaddleryError::Api {
            status: 400,
            message: "bad request".into(),
        },
        SaddleryError::Api {
            status: 422,
            message: "unprocessable".into(),
        },
    ];
    for err in permanent {
        assert!(!err.is_transient(), "{err} should be permanent");
    }
}

#[test]
fn retry_after_only_from_rate_limit() {
    assert_eq!(
        SaddleryError::RateLimited {
            retry_after: Some(Duration::from_secs(3))
        }
        .retry_after(),
        Some(Duration::from_secs(3))
    );
    assert_eq!(SaddleryError::RateLimited { retry_after: None }.retry_after(), None);
    assert_eq!(SaddleryError::Http("x".into()).retry_after(), None);
}

#[test]
fn json_errors_convert() {
    let err: SaddleryError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(matches!(err, SaddleryError::Json(_)));
}
