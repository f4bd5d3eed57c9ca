//! Kernel SDK types.

mod kernel;
pub use kernel::{
    Call, EntryPoint, ExecutionDetail, IKernelValidator, KERNEL_IMPLEMENTATIONS, Kernel,
    KernelFactory, KernelVersion, MultiSend, kernel_version_for_implementation,
};

mod mode;
pub use mode::{DeploymentRatchet, DeploymentState, ValidatorMode};

mod user_op;
pub use user_op::{GasEstimate, PackedUserOperation, UserOperation, UserOperationRequest};

mod webauthn;
pub use webauthn::WebAuthnAuth;
