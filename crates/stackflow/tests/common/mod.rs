use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// 2 AZ 構成の Web 層（demos/web-tier と同じ構成）
pub const WEB_TIER: &str = include_str!("../../../../demos/web-tier/stack.kdl");

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_stack_kdl(&self, content: &str) {
        let path = self.root.path().join("stack.kdl");
        fs::write(path, content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_resource(&self, name: &str, content: &str) {
        let dir = self.root.path().join("resources");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.kdl", name)), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_env(&self, content: &str) {
        fs::write(self.root.path().join(".env"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_settings(&self, content: &str) {
        let dir = self.root.path().join(".stackflow");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// ユーザー設定や環境変数の影響を受けない `stack` コマンド
    #[allow(dead_code, deprecated)]
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("stack").unwrap();
        cmd.current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".user-config"))
            .env_remove("STACKFLOW_FILE")
            .env_remove("STACKFLOW_PROJECT_ROOT")
            .env_remove("STACK_YOUR_IP")
            .env_remove("STACK_INSTANCE_TYPE")
            .env_remove("STACK_KEY_NAME")
            .env_remove("RUST_LOG");
        cmd
    }
}
