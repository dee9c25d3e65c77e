use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::shared::errors::{AppError, AppResult};

/// ハッシュ形式のバージョン識別子
const HASH_VERSION: &str = "v1";

/// ソルト長（バイト）
const SALT_LENGTH: usize = 16;

/// ストレッチング回数
const HASH_ITERATIONS: u32 = 100_000;

/// パスワードの最低文字数
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// パスワードをソルト付きでハッシュ化する
///
/// 出力形式は `v1$<salt_base64>$<hash_base64>`。
///
/// # 引数
/// * `password` - 平文パスワード
///
/// # 戻り値
/// * `AppResult<String>` - ハッシュ文字列
pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let hash = stretch(password.as_bytes(), &salt);

    Ok(format!(
        "{}${}${}",
        HASH_VERSION,
        general_purpose::STANDARD.encode(salt),
        general_purpose::STANDARD.encode(hash)
    ))
}

/// パスワードをハッシュと照合する
///
/// # 引数
/// * `password` - 平文パスワード
/// * `stored_hash` - `hash_password` で生成したハッシュ文字列
///
/// # 戻り値
/// * `AppResult<bool>` - 一致すればtrue
pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 3 || parts[0] != HASH_VERSION {
        return Err(AppError::security("パスワードハッシュの形式が不正です"));
    }

    let salt = general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|e| AppError::security(format!("ソルトのデコードに失敗しました: {}", e)))?;
    let expected = general_purpose::STANDARD
        .decode(parts[2])
        .map_err(|e| AppError::security(format!("ハッシュのデコードに失敗しました: {}", e)))?;

    let actual = stretch(password.as_bytes(), &salt);

    // 長さ比較後に全バイトを比較する（早期リターンしない）
    if actual.len() != expected.len() {
        return Ok(false);
    }
    let mut diff = 0u8;
    for (a, b) in actual.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    Ok(diff == 0)
}

/// パスワード文字列の事前検証
///
/// # 引数
/// * `password` - 平文パスワード
///
/// # 戻り値
/// * `AppResult<()>` - 検証結果
pub fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation("パスワードを入力してください"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(format!(
            "パスワードは{}文字以上で入力してください",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// ソルト付きハッシュを反復適用する
fn stretch(password: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password);
    let mut digest = hasher.finalize();

    for _ in 1..HASH_ITERATIONS {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(digest);
        digest = hasher.finalize();
    }

    digest.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("himitsu-no-password").unwrap();

        // 形式を確認
        assert!(hash.starts_with("v1$"));
        assert_eq!(hash.split('$').count(), 3);

        // 正しいパスワードで照合成功
        assert!(verify_password("himitsu-no-password", &hash).unwrap());

        // 間違ったパスワードで照合失敗
        assert!(!verify_password("machigai", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        // 同じパスワードでもソルトが異なるためハッシュは毎回変わる
        let hash1 = hash_password("onaji-password").unwrap();
        let hash2 = hash_password("onaji-password").unwrap();
        assert_ne!(hash1, hash2);

        // どちらも照合は成功する
        assert!(verify_password("onaji-password", &hash1).unwrap());
        assert!(verify_password("onaji-password", &hash2).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("password", "malformed").is_err());
        assert!(verify_password("password", "v2$abc$def").is_err());
        assert!(verify_password("password", "v1$not-base64!!$def").is_err());
    }

    #[test]
    fn test_validate_password() {
        // 空のパスワード
        assert!(validate_password("").is_err());

        // 短すぎるパスワード
        assert!(validate_password("abc12").is_err());

        // ちょうど6文字
        assert!(validate_password("abc123").is_ok());

        // 日本語パスワード（6文字）
        assert!(validate_password("あいうえおか").is_ok());
    }
}
