use std::env;

fn main() {
    // ビルド時に環境変数を設定
    // 環境変数は外部（スクリプトや `pnpm tauri dev` 実行時の .env ファイル）から提供されることを前提とする
    // 開発環境（pnpm tauri dev）では .env ファイルが自動的に読み込まれる

    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    println!("cargo:rustc-env=ENVIRONMENT={}", environment);

    // セッション暗号化キー
    // 本番ビルドではリリーススクリプトが必ず実際のキーを注入する
    let session_key = env::var("SESSION_ENCRYPTION_KEY")
        .unwrap_or_else(|_| "shigoto-daicho-dev-session-key".to_string());
    println!("cargo:rustc-env=SESSION_ENCRYPTION_KEY={}", session_key);

    // ログレベル
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    println!("cargo:rustc-env=LOG_LEVEL={}", log_level);

    // ビルド情報を出力
    println!("cargo:warning=ビルド環境: {}", environment);

    tauri_build::build()
}
