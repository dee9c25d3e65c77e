use nanoid::nanoid;

/// ユーザーID用のnanoIdを生成する
///
/// # 戻り値
/// 21文字のURL-safeなnanoId
///
/// # 特性
/// - 文字セット: A-Za-z0-9_- (64文字)
/// - 長さ: 21文字
/// - 衝突確率: 1兆個のIDで1%未満
pub fn generate_user_id() -> String {
    nanoid!()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_user_id_length() {
        let id = generate_user_id();
        assert_eq!(id.len(), 21);
    }

    #[test]
    fn test_generate_user_id_uniqueness() {
        let id1 = generate_user_id();
        let id2 = generate_user_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_user_id_charset() {
        let id = generate_user_id();
        assert!(id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-'));
    }
}
