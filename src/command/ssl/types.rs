//! Argument types used by the SSL commands
use atat::atat_derive::AtatEnum;

/// Action of `#SSLSECDATA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityDataAction {
    Delete = 0,
    Store = 1,
    Read = 2,
}

/// Kind of security data handled by `#SSLSECDATA`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AtatEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityDataType {
    Certificate = 0,
    CaCertificate = 1,
    RsaPrivateKey = 2,
}
