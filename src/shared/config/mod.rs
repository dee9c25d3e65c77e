/// 設定管理モジュール
///
/// 実行環境の判定、環境変数の読み込み、ログシステムの初期化を提供します。
pub mod environment;

pub use environment::*;

/// 実行環境に応じたデータベースファイル名を取得する
///
/// # 引数
/// * `environment` - 実行環境
///
/// # 戻り値
/// データベースファイル名
///
/// 開発環境と本番環境でファイルを分け、開発中のデータが
/// 本番データベースに混入しないようにする。
pub fn get_database_filename(environment: Environment) -> &'static str {
    match environment {
        Environment::Development => "shigoto_dev.db",
        Environment::Production => "shigoto.db",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_database_filename() {
        assert_eq!(
            get_database_filename(Environment::Development),
            "shigoto_dev.db"
        );
        assert_eq!(get_database_filename(Environment::Production), "shigoto.db");
    }
}
