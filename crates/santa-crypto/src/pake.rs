//! SRP-6a client engine (RFC 5054 2048-bit group, SHA-256).
//!
//! The engine derives password verifiers for registration and solves
//! server challenges at login. The secret itself is never transmitted;
//! the PBKDF2-stretched private exponent doubles as the symmetric
//! wrapping key handed to the symmetric layer, and is exposed only as
//! that wrap/unwrap-capable handle.
//!
//! Group and hash are fixed for the lifetime of a deployment. Degenerate
//! ephemeral values (B ≡ 0 mod N, u = 0) abort the exchange instead of
//! silently deriving a wrong key.

use num_bigint::BigUint;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::encoding::hex_decode;
use crate::error::{CryptoError, Result};
use crate::symmetric::SecretKey;
use crate::KEY_SIZE;

/// RFC 5054 Appendix A, 2048-bit group prime (a safe prime), g = 2.
const N_HEX: &str = "AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050\
A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50\
E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B8\
55F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773B\
CA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748\
544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6\
AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB6\
94B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

const GENERATOR: u32 = 2;

/// Byte length of the group modulus; values are left-padded to this
/// width wherever the protocol hashes padded operands.
const N_BYTES: usize = 256;

const SALT_BYTES: usize = 16;
const EPHEMERAL_SECRET_BYTES: usize = 32;

/// Engine parameters. The iteration count feeds the PBKDF2 stretching
/// of the private exponent and must stay at 300_000+ in deployments.
#[derive(Debug, Clone)]
pub struct PakeParams {
    pub iterations: u32,
}

impl Default for PakeParams {
    fn default() -> Self {
        Self {
            iterations: 310_000,
        }
    }
}

/// Registration-time output: the verifier/salt pair for the server and
/// the stretched wrapping key kept client-side.
pub struct DerivedVerifier {
    pub verifier_hex: String,
    pub salt_hex: String,
    /// The PBKDF2-derived key, already imported as a wrap/unwrap-only
    /// symmetric handle.
    pub wrap_key: SecretKey,
}

impl DerivedVerifier {
    /// Wire encoding stored server-side: `verifier_hex + "." + salt_hex`.
    pub fn encode(&self) -> String {
        format!("{}.{}", self.verifier_hex, self.salt_hex)
    }
}

/// Login-time output: the client ephemeral and proof to send, plus the
/// stretched wrapping key and the expected server proof.
pub struct ChallengeSolution {
    pub wrap_key: SecretKey,
    pub client_pub_hex: String,
    pub proof_hex: String,
    server_proof: Vec<u8>,
}

impl ChallengeSolution {
    /// Constant-time check of the server's proof (M2). A mismatch means
    /// the server never knew the shared session key.
    pub fn verify_server_proof(&self, server_proof_hex: &str) -> bool {
        match hex_decode(server_proof_hex) {
            Ok(proof) => bool::from(proof.ct_eq(&self.server_proof)),
            Err(_) => false,
        }
    }
}

/// SRP-6a client over the fixed 2048-bit safe-prime group.
#[derive(Debug, Clone)]
pub struct PakeEngine {
    n: BigUint,
    g: BigUint,
    k: BigUint,
    params: PakeParams,
}

impl Default for PakeEngine {
    fn default() -> Self {
        Self::new(PakeParams::default())
    }
}

impl PakeEngine {
    pub fn new(params: PakeParams) -> Self {
        let n = BigUint::parse_bytes(N_HEX.as_bytes(), 16)
            .unwrap_or_else(|| unreachable!("group prime constant is valid hex"));
        let g = BigUint::from(GENERATOR);

        // k = H(N | PAD(g))
        let k = hash_to_int(&[&n.to_bytes_be(), pad_to(&g).as_slice()]);

        Self { n, g, k, params }
    }

    /// Derive the verifier/salt pair for a new secret: x = PBKDF2(secret,
    /// salt), v = g^x mod N. The verifier is not reversible to the secret.
    pub fn derive_verifier(&self, secret: &SecretString) -> DerivedVerifier {
        let salt = random_bytes(SALT_BYTES);
        let x_bytes = self.stretch(secret, &salt);
        let x = BigUint::from_bytes_be(&x_bytes);
        let v = self.g.modpow(&x, &self.n);

        DerivedVerifier {
            verifier_hex: hex::encode(v.to_bytes_be()),
            salt_hex: hex::encode(&salt),
            wrap_key: SecretKey::from_bytes(x_bytes),
        }
    }

    /// Solve a server challenge: derive the session proof for `identity`
    /// without ever sending the secret.
    pub fn solve_challenge(
        &self,
        server_pub_hex: &str,
        identity: &str,
        secret: &SecretString,
        salt_hex: &str,
    ) -> Result<ChallengeSolution> {
        let salt = hex_decode(salt_hex)?;
        let b_pub = BigUint::from_bytes_be(&hex_decode(server_pub_hex)?) % &self.n;
        if b_pub == BigUint::from(0u32) {
            return Err(CryptoError::InvalidEphemeral);
        }

        let x_bytes = self.stretch(secret, &salt);
        let x = BigUint::from_bytes_be(&x_bytes);

        let a = BigUint::from_bytes_be(&random_bytes(EPHEMERAL_SECRET_BYTES));
        let a_pub = self.g.modpow(&a, &self.n);

        // u = H(PAD(A) | PAD(B))
        let u = hash_to_int(&[&pad_to(&a_pub), &pad_to(&b_pub)]);
        if u == BigUint::from(0u32) {
            return Err(CryptoError::InvalidEphemeral);
        }

        // S = (B - k * g^x) ^ (a + u * x) mod N
        let gx = self.g.modpow(&x, &self.n);
        let kgx = (&self.k * &gx) % &self.n;
        let base = (&b_pub + &self.n - &kgx) % &self.n;
        let exp = &a + &u * &x;
        let s = base.modpow(&exp, &self.n);

        // K = H(PAD(S))
        let session_key = hash(&[&pad_to(&s)]);

        // M1 = H(H(N) xor H(g) | H(I) | salt | A | B | K)
        let hn = hash(&[&self.n.to_bytes_be()]);
        let hg = hash(&[&self.g.to_bytes_be()]);
        let hng: Vec<u8> = hn.iter().zip(hg.iter()).map(|(a, b)| a ^ b).collect();
        let hi = hash(&[identity.as_bytes()]);
        let proof = hash(&[
            &hng,
            &hi,
            &salt,
            &a_pub.to_bytes_be(),
            &b_pub.to_bytes_be(),
            &session_key,
        ]);

        // M2 = H(A | M1 | K)
        let server_proof = hash(&[&a_pub.to_bytes_be(), &proof, &session_key]);

        Ok(ChallengeSolution {
            wrap_key: SecretKey::from_bytes(x_bytes),
            client_pub_hex: hex::encode(a_pub.to_bytes_be()),
            proof_hex: hex::encode(&proof),
            server_proof,
        })
    }

    /// PBKDF2-SHA256 stretch of the secret into the private exponent.
    fn stretch(&self, secret: &SecretString, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut out = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            secret.expose_secret().as_bytes(),
            salt,
            self.params.iterations,
            &mut out,
        );
        out
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn hash(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

fn hash_to_int(parts: &[&[u8]]) -> BigUint {
    BigUint::from_bytes_be(&hash(parts))
}

/// Left-pad the big-endian bytes of `x` to the modulus width.
fn pad_to(x: &BigUint) -> Vec<u8> {
    let bytes = x.to_bytes_be();
    let mut padded = vec![0u8; N_BYTES.saturating_sub(bytes.len())];
    padded.extend_from_slice(&bytes);
    padded
}
