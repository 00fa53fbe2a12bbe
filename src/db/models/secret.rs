/// Ciphertext envelope for one alias. Only ever ciphertext; key material
/// stays behind the keystore boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecret {
    pub alias: String,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}
