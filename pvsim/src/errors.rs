use thiserror::Error;

/// A type alias for a result with a [`SimError`] as the error type
pub type SimResult<T> = Result<T, SimError>;

/// Structural misuse detected while a design is being elaborated. These are
/// programming errors in the design description and abort construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// The named owner or parent is not a live module of this context
    #[error("{what} \"{name}\" must be declared inside a live module")]
    UnknownModule { what: &'static str, name: String },

    /// Inputs and outputs are ports of a sub-module, the root has none
    #[error("{kind} \"{name}\" cannot be declared on the root module")]
    PortOnRoot { kind: &'static str, name: String },

    /// Outputs sensitize the declaring module's parent, so one is required
    #[error("output \"{name}\" requires its module \"{module}\" to have a parent")]
    OutputWithoutParent { name: String, module: String },

    /// A second behaviour was installed on the same module
    #[error("module \"{0}\" already has an installed behaviour")]
    BehaviourAlreadyInstalled(String),

    /// Display widths must be at least one bit
    #[error("\"{0}\" cannot have a width of zero bits")]
    InvalidWidth(String),

    /// The root module lives as long as the context
    #[error("the root module \"{0}\" cannot be removed")]
    CannotRemoveRoot(String),

    /// The component referenced was already removed
    #[error("{0} was already removed")]
    AlreadyRemoved(&'static str),

    /// Only one simulation context may be alive per thread
    #[error("a simulation context is already active on this thread")]
    ContextAlreadyActive,
}

/// An enum representing the errors that can occur while building or running
/// a simulation. Termination conditions such as the iteration limit are not
/// errors, see [`RunStatus`](crate::simulation::RunStatus).
#[derive(Error, Debug)]
pub enum SimError {
    /// The design could not be elaborated
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// A trace sink failed to write
    #[error("trace sink failure: {0}")]
    Trace(#[from] std::io::Error),

    /// A configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SimError {
    /// Returns the construction error if that is what this is.
    pub fn as_construction(&self) -> Option<&ConstructionError> {
        if let Self::Construction(e) = self {
            Some(e)
        } else {
            None
        }
    }
}
