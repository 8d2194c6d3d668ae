//! Web3 Secret Storage (v3) keystores
//!
//! Encrypts with scrypt or PBKDF2-HMAC-SHA256, AES-128-CTR and a Keccak-256
//! MAC over `derived_key[16..32] ‖ ciphertext`. Decryption accepts documents
//! produced by geth, ethers, MetaMask and MyEtherWallet, within fixed cost
//! ceilings. scrypt settings with N >= 2^(16·r) are refused.

use super::SecureWallet;
use crate::{Error, Result};
use aes::Aes128;
use alloy::hex;
use alloy::primitives::{keccak256, B256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const DKLEN: u8 = 32;

/// Ceilings on KDF cost accepted from foreign documents
const MAX_SCRYPT_LOG_N: u8 = 20;
const MAX_SCRYPT_MEMORY: u64 = 512 * 1024 * 1024;
const MAX_SCRYPT_WORK: u64 = 1 << 24;
const MAX_PBKDF2_ROUNDS: u32 = 10_000_000;

/// Key-derivation settings used when encrypting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kdf", rename_all = "lowercase")]
pub enum KdfParams {
    Scrypt { log_n: u8, r: u32, p: u32 },
    Pbkdf2 { c: u32 },
}

impl KdfParams {
    /// geth's "standard" scrypt parameters (N = 2^18, r = 8, p = 1)
    pub const fn standard() -> Self {
        Self::Scrypt {
            log_n: 18,
            r: 8,
            p: 1,
        }
    }

    /// geth's "light" scrypt parameters (N = 2^12, r = 8, p = 6)
    pub const fn light() -> Self {
        Self::Scrypt {
            log_n: 12,
            r: 8,
            p: 6,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// On-disk v3 document. Unknown ciphers or KDFs and wrongly sized
/// buffers are rejected while parsing.
#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(alias = "Crypto")]
    crypto: Sealed,
    id: Uuid,
    version: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sealed {
    cipher: Cipher,
    cipherparams: CipherParams,
    #[serde(with = "hex_bytes")]
    ciphertext: [u8; 32],
    #[serde(flatten)]
    kdf: Kdf,
    #[serde(with = "hex_bytes")]
    mac: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Cipher {
    #[serde(rename = "aes-128-ctr")]
    Aes128Ctr,
}

#[derive(Debug, Serialize, Deserialize)]
struct CipherParams {
    #[serde(with = "hex_bytes")]
    iv: [u8; 16],
}

/// `kdf` names the function, `kdfparams` carries its settings
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kdf", content = "kdfparams", rename_all = "lowercase")]
enum Kdf {
    Scrypt(ScryptSettings),
    Pbkdf2(Pbkdf2Settings),
}

#[derive(Debug, Serialize, Deserialize)]
struct ScryptSettings {
    dklen: u8,
    n: u32,
    p: u32,
    r: u32,
    #[serde(with = "hex_bytes")]
    salt: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Pbkdf2Settings {
    c: u32,
    dklen: u8,
    prf: Prf,
    #[serde(with = "hex_bytes")]
    salt: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Prf {
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
}

/// Unprefixed hex for byte buffers, length-checked on the way in
mod hex_bytes {
    use alloy::hex;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(D::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected length {}", len)))
    }
}

fn fail(reason: &str) -> Error {
    Error::DecryptionFailed(reason.to_string())
}

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| Error::Entropy(e.to_string()))?;
    Ok(buf)
}

impl ScryptSettings {
    /// scrypt parameters, refused before any allocation when their memory
    /// (`128·r·(N + p)` bytes) or work (`N·r·p`) exceeds the ceilings
    fn params(&self) -> Result<scrypt::Params> {
        if self.dklen < DKLEN || !self.n.is_power_of_two() || self.n < 2 {
            return Err(fail("unsupported scrypt parameters"));
        }
        let log_n = self.n.trailing_zeros() as u8;
        if log_n > MAX_SCRYPT_LOG_N {
            return Err(fail("scrypt work factor too large"));
        }

        let (n, r, p) = (u64::from(self.n), u64::from(self.r), u64::from(self.p));
        let memory = n
            .checked_add(p)
            .and_then(|blocks| blocks.checked_mul(r))
            .and_then(|words| words.checked_mul(128));
        let work = n.checked_mul(r).and_then(|nr| nr.checked_mul(p));
        let affordable = matches!(
            (memory, work),
            (Some(memory), Some(work)) if memory <= MAX_SCRYPT_MEMORY && work <= MAX_SCRYPT_WORK
        );
        if !affordable {
            return Err(fail("scrypt cost too large"));
        }

        // Also refuses N >= 2^(16·r), which rules out r = 1 with N >= 2^16
        scrypt::Params::new(log_n, self.r, self.p, self.dklen as usize)
            .map_err(|_| fail("unsupported scrypt parameters"))
    }
}

impl Pbkdf2Settings {
    fn check(&self) -> Result<()> {
        if self.dklen < DKLEN || self.c == 0 || self.c > MAX_PBKDF2_ROUNDS {
            return Err(fail("unsupported pbkdf2 parameters"));
        }
        Ok(())
    }
}

impl Kdf {
    fn derive(&self, password: &[u8]) -> Result<Vec<u8>> {
        match self {
            Kdf::Scrypt(settings) => {
                let params = settings.params()?;
                let mut key = vec![0u8; settings.dklen as usize];
                scrypt::scrypt(password, &settings.salt, &params, &mut key)
                    .map_err(|_| fail("unsupported scrypt parameters"))?;
                Ok(key)
            }
            Kdf::Pbkdf2(settings) => {
                settings.check()?;
                let mut key = vec![0u8; settings.dklen as usize];
                pbkdf2::pbkdf2_hmac::<Sha256>(password, &settings.salt, settings.c, &mut key);
                Ok(key)
            }
        }
    }
}

fn compute_mac(derived_key: &[u8], ciphertext: &[u8]) -> B256 {
    let mut preimage = Vec::with_capacity(16 + ciphertext.len());
    preimage.extend_from_slice(&derived_key[16..32]);
    preimage.extend_from_slice(ciphertext);
    keccak256(preimage)
}

fn apply_ctr(derived_key: &[u8], iv: &[u8; 16], data: &mut [u8]) -> Result<()> {
    let mut cipher = Aes128Ctr::new_from_slices(&derived_key[..16], iv)
        .map_err(|_| fail("invalid cipher parameters"))?;
    cipher.apply_keystream(data);
    Ok(())
}

/// Encrypt a wallet's key into a v3 keystore JSON document
pub fn encrypt(wallet: &SecureWallet, password: &str, params: KdfParams) -> Result<String> {
    if password.is_empty() {
        return Err(Error::invalid("keystore password must not be empty"));
    }

    let salt = random_bytes::<32>()?.to_vec();
    let iv = random_bytes::<16>()?;

    let kdf = match params {
        KdfParams::Scrypt { log_n, r, p } => Kdf::Scrypt(ScryptSettings {
            dklen: DKLEN,
            n: 1u32
                .checked_shl(log_n as u32)
                .ok_or_else(|| Error::Config(format!("scrypt log_n {} out of range", log_n)))?,
            p,
            r,
            salt,
        }),
        KdfParams::Pbkdf2 { c } => Kdf::Pbkdf2(Pbkdf2Settings {
            c,
            dklen: DKLEN,
            prf: Prf::HmacSha256,
            salt,
        }),
    };

    let mut derived_key = kdf
        .derive(password.as_bytes())
        .map_err(|_| Error::Config("invalid keystore KDF parameters".to_string()))?;

    let mut ciphertext = wallet.key_bytes().0;
    apply_ctr(&derived_key, &iv, &mut ciphertext)?;
    let mac = compute_mac(&derived_key, &ciphertext);
    derived_key.fill(0);

    let document = Document {
        address: Some(hex::encode(wallet.address())),
        crypto: Sealed {
            cipher: Cipher::Aes128Ctr,
            cipherparams: CipherParams { iv },
            ciphertext,
            kdf,
            mac: mac.0,
        },
        id: Uuid::new_v4(),
        version: 3,
    };

    Ok(serde_json::to_string(&document)?)
}

/// Decrypt a v3 keystore document.
///
/// Every failure mode, including a wrong password, is `DecryptionFailed`.
pub fn decrypt(json: &str, password: &str) -> Result<SecureWallet> {
    let document: Document = serde_json::from_str(json)
        .map_err(|_| fail("malformed or unsupported keystore document"))?;

    if document.version != 3 {
        return Err(fail("unsupported keystore version"));
    }
    let sealed = &document.crypto;

    let mut derived_key = sealed.kdf.derive(password.as_bytes())?;

    let mac = compute_mac(&derived_key, &sealed.ciphertext);
    if !bool::from(mac.as_slice().ct_eq(&sealed.mac[..])) {
        derived_key.fill(0);
        return Err(fail("wrong password or corrupted keystore"));
    }

    let mut plaintext = B256::from(sealed.ciphertext);
    let decrypted = apply_ctr(&derived_key, &sealed.cipherparams.iv, plaintext.as_mut_slice());
    derived_key.fill(0);
    decrypted?;

    let wallet = SecureWallet::from_bytes(&plaintext);
    plaintext.0.fill(0);
    let wallet = wallet.map_err(|_| fail("decrypted key is not a valid secp256k1 key"))?;

    if let Some(address) = &document.address {
        let expected = address.trim_start_matches("0x").to_lowercase();
        if expected != hex::encode(wallet.address()) {
            return Err(fail("keystore address does not match decrypted key"));
        }
    }

    Ok(wallet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const TEST_KEY: &str = "0x7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

    // Cheap parameters so the suite stays fast in debug builds
    const FAST_SCRYPT: KdfParams = KdfParams::Scrypt {
        log_n: 4,
        r: 8,
        p: 1,
    };

    // Test vector from the Web3 Secret Storage definition, password "testpassword"
    const PBKDF2_VECTOR: &str = r#"{
        "crypto" : {
            "cipher" : "aes-128-ctr",
            "cipherparams" : { "iv" : "6087dab2f9fdbbfaddc31a909735c1e6" },
            "ciphertext" : "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
            "kdf" : "pbkdf2",
            "kdfparams" : {
                "c" : 262144,
                "dklen" : 32,
                "prf" : "hmac-sha256",
                "salt" : "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
            },
            "mac" : "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"
        },
        "id" : "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version" : 3
    }"#;

    // Same key and password under scrypt N = 2^13, r = 8, p = 1
    const SCRYPT_VECTOR: &str = r#"{
        "address" : "008aeeda4d805471df9b2a5b0f38a0c3bcba786b",
        "crypto" : {
            "cipher" : "aes-128-ctr",
            "cipherparams" : { "iv" : "2c7e1f9a4b6d8e0c3a5f7b9d1e3c5a7f" },
            "ciphertext" : "57c0dbbf9e879cbcc5f65901ba192c63841b93cc2515276da15eeda1dd41e127",
            "kdf" : "scrypt",
            "kdfparams" : {
                "dklen" : 32,
                "n" : 8192,
                "p" : 1,
                "r" : 8,
                "salt" : "d5b1a8e3c20f4a7c9e6b3f0d2a8c5e1b7f4d0a3c6e9b2f5d8a1c4e7b0d3f6a92"
            },
            "mac" : "e00114bffb719466a15e29adc1595c1bd35de06118e9b980616b10942f89ce57"
        },
        "id" : "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version" : 3
    }"#;

    // r = 1 with N = 2^18 breaks scrypt's N < 2^(16·r) bound
    const SCRYPT_R1_VECTOR: &str = r#"{
        "crypto" : {
            "cipher" : "aes-128-ctr",
            "cipherparams" : { "iv" : "83dbcc02d8ccb40e466191a123791e0e" },
            "ciphertext" : "d172bf743a674da9cdad04534d56926ef8358534d458fffccd4e6ad2fbde479c",
            "kdf" : "scrypt",
            "kdfparams" : {
                "dklen" : 32,
                "n" : 262144,
                "p" : 8,
                "r" : 1,
                "salt" : "ab0c7876052600dd703518d6fc3fe8984592145b591fc8fb5c6d43190334ba19"
            },
            "mac" : "2103ac29920d71da29f15d75b4a16dbe95cfd7ff8faea1056c33131d846e3097"
        },
        "id" : "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version" : 3
    }"#;

    fn test_wallet() -> SecureWallet {
        SecureWallet::from_hex(TEST_KEY).unwrap()
    }

    #[test]
    fn decrypts_pbkdf2_test_vector() {
        let wallet = decrypt(PBKDF2_VECTOR, "testpassword").unwrap();
        assert_eq!(wallet.export_private_key().expose_secret(), TEST_KEY);
    }

    #[test]
    fn decrypts_scrypt_test_vector() {
        let wallet = decrypt(SCRYPT_VECTOR, "testpassword").unwrap();
        assert_eq!(wallet.export_private_key().expose_secret(), TEST_KEY);
    }

    #[test]
    fn scrypt_below_sixteen_r_bound_is_refused() {
        let err = decrypt(SCRYPT_R1_VECTOR, "testpassword").unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed(_)));
    }

    #[test]
    fn test_vector_rejects_wrong_password() {
        let err = decrypt(PBKDF2_VECTOR, "testpassword1").unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed(_)));
    }

    #[test]
    fn scrypt_round_trip() {
        let json = encrypt(&test_wallet(), "hunter2", FAST_SCRYPT).unwrap();
        let wallet = decrypt(&json, "hunter2").unwrap();
        assert_eq!(wallet.export_private_key().expose_secret(), TEST_KEY);
    }

    #[test]
    fn pbkdf2_round_trip() {
        let json = encrypt(&test_wallet(), "correct horse", KdfParams::Pbkdf2 { c: 1024 }).unwrap();
        let wallet = decrypt(&json, "correct horse").unwrap();
        assert_eq!(wallet.address(), test_wallet().address());
    }

    #[test]
    fn wrong_password_fails_closed() {
        let json = encrypt(&test_wallet(), "right", FAST_SCRYPT).unwrap();
        for wrong in ["wrong", "", "right ", "Right"] {
            assert!(matches!(
                decrypt(&json, wrong),
                Err(Error::DecryptionFailed(_))
            ));
        }
    }

    #[test]
    fn document_has_web3_secret_storage_shape() {
        let json = encrypt(&test_wallet(), "pw", FAST_SCRYPT).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], 3);
        assert_eq!(value["crypto"]["cipher"], "aes-128-ctr");
        assert_eq!(value["crypto"]["kdf"], "scrypt");
        assert_eq!(value["crypto"]["kdfparams"]["n"], 16);
        assert_eq!(value["crypto"]["kdfparams"]["dklen"], 32);
        assert_eq!(
            value["address"],
            hex::encode(test_wallet().address())
        );
        assert!(Uuid::parse_str(value["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn tampered_mac_or_ciphertext_fails() {
        let json = encrypt(&test_wallet(), "pw", FAST_SCRYPT).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let mut tampered = value.clone();
        tampered["crypto"]["mac"] = serde_json::json!("00".repeat(32));
        assert!(matches!(
            decrypt(&tampered.to_string(), "pw"),
            Err(Error::DecryptionFailed(_))
        ));

        let ciphertext = value["crypto"]["ciphertext"].as_str().unwrap().to_string();
        let flipped = if ciphertext.starts_with('0') {
            format!("1{}", &ciphertext[1..])
        } else {
            format!("0{}", &ciphertext[1..])
        };
        value["crypto"]["ciphertext"] = serde_json::json!(flipped);
        assert!(matches!(
            decrypt(&value.to_string(), "pw"),
            Err(Error::DecryptionFailed(_))
        ));
    }

    #[test]
    fn mismatched_address_fails() {
        let json = encrypt(&test_wallet(), "pw", FAST_SCRYPT).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["address"] = serde_json::json!("00".repeat(20));
        assert!(matches!(
            decrypt(&value.to_string(), "pw"),
            Err(Error::DecryptionFailed(_))
        ));
    }

    #[test]
    fn malformed_documents_fail() {
        for doc in ["", "{}", "not json", r#"{"version":3}"#] {
            assert!(matches!(
                decrypt(doc, "pw"),
                Err(Error::DecryptionFailed(_))
            ));
        }
    }

    #[test]
    fn empty_password_is_rejected_on_export() {
        assert!(matches!(
            encrypt(&test_wallet(), "", FAST_SCRYPT),
            Err(Error::InvalidInput(_))
        ));
    }

    fn with_kdfparams(json: &str, edit: impl FnOnce(&mut serde_json::Value)) -> String {
        let mut value: serde_json::Value = serde_json::from_str(json).unwrap();
        edit(&mut value["crypto"]["kdfparams"]);
        value.to_string()
    }

    fn refused(doc: &str) -> bool {
        matches!(decrypt(doc, "pw"), Err(Error::DecryptionFailed(_)))
    }

    #[test]
    fn oversized_scrypt_costs_are_refused_before_deriving() {
        let json = encrypt(&test_wallet(), "pw", FAST_SCRYPT).unwrap();

        // 128 · 2^24 · 2^20 bytes would abort the process if allocated
        assert!(refused(&with_kdfparams(&json, |k| {
            k["n"] = 1_048_576.into();
            k["r"] = 16_777_216.into();
            k["p"] = 1.into();
        })));
        assert!(refused(&with_kdfparams(&json, |k| k["n"] = (1u32 << 21).into())));
        assert!(refused(&with_kdfparams(&json, |k| k["r"] = u32::MAX.into())));
        assert!(refused(&with_kdfparams(&json, |k| k["p"] = u32::MAX.into())));
        assert!(refused(&with_kdfparams(&json, |k| {
            k["n"] = (1u32 << 18).into();
            k["r"] = 8.into();
            k["p"] = 64.into();
        })));
        assert!(refused(&with_kdfparams(&json, |k| k["n"] = 24.into())));
        assert!(refused(&with_kdfparams(&json, |k| k["dklen"] = 16.into())));
    }

    #[test]
    fn oversized_pbkdf2_costs_are_refused() {
        let json = encrypt(&test_wallet(), "pw", KdfParams::Pbkdf2 { c: 1024 }).unwrap();
        assert!(refused(&with_kdfparams(&json, |k| {
            k["c"] = (MAX_PBKDF2_ROUNDS + 1).into()
        })));
        assert!(refused(&with_kdfparams(&json, |k| k["c"] = 0.into())));
        assert!(refused(&with_kdfparams(&json, |k| k["dklen"] = 31.into())));
        assert!(refused(&with_kdfparams(&json, |k| {
            k["prf"] = "hmac-sha512".into()
        })));
    }

    #[test]
    fn unknown_cipher_or_kdf_is_refused() {
        let json = encrypt(&test_wallet(), "pw", FAST_SCRYPT).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let mut cipher = value.clone();
        cipher["crypto"]["cipher"] = "aes-128-cbc".into();
        assert!(refused(&cipher.to_string()));

        let mut kdf = value.clone();
        kdf["crypto"]["kdf"] = "argon2id".into();
        assert!(refused(&kdf.to_string()));

        // kdf name and kdfparams shape must agree
        let mut mismatched = value.clone();
        mismatched["crypto"]["kdf"] = "pbkdf2".into();
        assert!(refused(&mismatched.to_string()));

        let mut short_iv = value;
        short_iv["crypto"]["cipherparams"]["iv"] = "00".repeat(8).into();
        assert!(refused(&short_iv.to_string()));
    }
}
