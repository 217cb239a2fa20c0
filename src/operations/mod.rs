//! Built-in operations.
//!
//! - [`warp`]: interactive stroke-driven displacement field editing
//! - [`median`]: percentile blur over square, circular or diamond windows
//! - [`distance`]: linear-time distance transform

pub mod distance;
pub mod median;
pub mod warp;

use crate::core::error::{TileworkError, TileworkResult};
use crate::core::operation::{Operation, OperationMetadata};

pub use distance::DistanceTransform;
pub use median::MedianBlur;
pub use warp::WarpOperation;

/// Identifiers of every built-in operation.
pub const OPERATION_IDS: [&str; 3] = ["warp", "median-blur", "distance-transform"];

/// Create a built-in operation with default parameters.
pub fn create(id: &str) -> TileworkResult<Box<dyn Operation>> {
    let operation: Box<dyn Operation> = match id {
        "warp" => Box::new(WarpOperation::new()),
        "median-blur" => Box::new(MedianBlur::new()),
        "distance-transform" => Box::new(DistanceTransform::new()),
        _ => return Err(TileworkError::UnknownOperation(id.to_string())),
    };
    Ok(operation)
}

/// Metadata of every built-in operation.
pub fn list() -> Vec<OperationMetadata> {
    OPERATION_IDS
        .iter()
        .filter_map(|id| create(id).ok())
        .map(|op| op.metadata())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_all() {
        for id in OPERATION_IDS {
            let op = create(id).unwrap();
            assert_eq!(op.metadata().id, id);
        }
        assert!(matches!(
            create("gaussian-blur"),
            Err(TileworkError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_defaults_match_metadata() {
        for metadata in list() {
            let op = create(&metadata.id).unwrap();
            for param in &metadata.parameters {
                assert_eq!(
                    op.parameter(&param.name).as_ref(),
                    Some(&param.default_value),
                    "{}.{}",
                    metadata.id,
                    param.name
                );
            }
        }
    }
}
