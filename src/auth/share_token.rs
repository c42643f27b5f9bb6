//! Share link token generation

use rand::{thread_rng, RngCore};

/// 分享令牌前缀
const PREFIX: &str = "shr_";

/// Share link token generator
pub struct ShareTokenGenerator;

impl ShareTokenGenerator {
    /// Generate a new share token
    /// Format: shr_<hex(random bytes)>
    pub fn generate(bytes: usize) -> String {
        let mut buf = vec![0u8; bytes];
        thread_rng().fill_bytes(&mut buf);
        format!("{}{}", PREFIX, hex::encode(buf))
    }

    /// 格式检查，在查缓存之前拒绝明显无效的令牌
    pub fn looks_valid(token: &str) -> bool {
        token
            .strip_prefix(PREFIX)
            .is_some_and(|body| !body.is_empty() && body.len() % 2 == 0 && hex::decode(body).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_share_token() {
        let token = ShareTokenGenerator::generate(24);
        assert!(token.starts_with("shr_"));
        assert_eq!(token.len(), 4 + 48); // "shr_" + 24 bytes hex
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = ShareTokenGenerator::generate(24);
        let b = ShareTokenGenerator::generate(24);
        assert_ne!(a, b);
    }

    #[test]
    fn test_looks_valid() {
        assert!(ShareTokenGenerator::looks_valid(&ShareTokenGenerator::generate(16)));
        assert!(!ShareTokenGenerator::looks_valid("shr_"));
        assert!(!ShareTokenGenerator::looks_valid("shr_xyz1"));
        assert!(!ShareTokenGenerator::looks_valid("ops_ak_abcdef"));
    }
}
