pub mod access;
pub mod exemption;

pub use access::AccessState;
pub use exemption::ExemptionSet;
