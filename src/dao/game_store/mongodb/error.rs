use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// Client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// Server never answered the initial ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made before giving up.
        attempts: u32,
        /// Last driver failure.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// Loading a document failed.
    #[error("failed to load {kind} `{id}`")]
    Load {
        /// Document kind.
        kind: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
    /// Writing a document failed.
    #[error("failed to save {kind} `{id}`")]
    Save {
        /// Document kind.
        kind: &'static str,
        /// Document id.
        id: Uuid,
        /// Driver failure.
        #[source]
        source: MongoError,
    },
}
