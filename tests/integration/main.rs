//! Integration tests for getrun

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn getrun() -> Command {
        let mut cmd = cargo_bin_cmd!("getrun");
        cmd.env_remove("GETRUN_CONFIG").env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn help_displays() {
        getrun()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("MAIN_CLASS"));
    }

    #[test]
    fn version_displays() {
        getrun()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("getrun"));
    }

    #[test]
    fn too_few_arguments_print_usage() {
        let temp = TempDir::new().unwrap();
        getrun()
            .current_dir(temp.path())
            .args(["org.example", "tool", "1.0"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("invalid cmd"))
            .stdout(predicate::str::contains(
                "ie. getrun <group> <artifact> <version> <mainClass>",
            ));

        assert!(!temp.path().join("artifacts").exists());
    }

    #[test]
    fn too_many_arguments_print_usage() {
        let temp = TempDir::new().unwrap();
        getrun()
            .current_dir(temp.path())
            .args(["g", "a", "1.0", "Main", "extra"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("invalid cmd"));

        assert!(!temp.path().join("artifacts").exists());
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "[cache\n").unwrap();

        getrun()
            .current_dir(temp.path())
            .arg("--config")
            .arg(&config)
            .args(["g", "a", "1.0", "Main"])
            .assert()
            .code(4)
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}

#[cfg(unix)]
mod run_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::process::Stdio;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Workspace with a stub `java`, an on-disk repository and a config file
    struct Fixture {
        temp: TempDir,
    }

    impl Fixture {
        fn new(java_script: &str) -> Self {
            let temp = TempDir::new().unwrap();
            let root = temp.path();

            let java = root.join("java");
            std::fs::write(&java, format!("#!/bin/sh\n{}\n", java_script)).unwrap();
            std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

            std::fs::create_dir(root.join("repo")).unwrap();
            std::fs::write(
                root.join("config.toml"),
                format!(
                    "[launch]\njava = '{}'\n\n[[repositories]]\nname = 'local'\nlocation_uri = 'file://{}'\n",
                    java.display(),
                    root.join("repo").display()
                ),
            )
            .unwrap();

            Self { temp }
        }

        fn root(&self) -> &Path {
            self.temp.path()
        }

        fn artifacts(&self) -> PathBuf {
            self.root().join("artifacts")
        }

        /// Publish `g:<artifact>:<version>` with the given dependency XML
        fn publish(&self, artifact: &str, version: &str, dependencies: &str) {
            let dir = self.root().join("repo/g").join(artifact).join(version);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join(format!("{}-{}.pom", artifact, version)),
                format!(
                    "<project><groupId>g</groupId><artifactId>{}</artifactId>\
                     <version>{}</version><dependencies>{}</dependencies></project>",
                    artifact, version, dependencies
                ),
            )
            .unwrap();
            std::fs::write(dir.join(format!("{}-{}.jar", artifact, version)), b"PK").unwrap();
        }

        fn getrun(&self, coordinate: [&str; 4]) -> Command {
            let mut cmd = cargo_bin_cmd!("getrun");
            cmd.env_remove("GETRUN_CONFIG")
                .env_remove("RUST_LOG")
                .current_dir(self.root())
                .arg("--config")
                .arg(self.root().join("config.toml"))
                .args(coordinate);
            cmd
        }
    }

    #[test]
    fn reuses_cache_and_forwards_exit_code() {
        let fixture = Fixture::new("echo \"cp=$2 main=$3\"\nexit 5");
        std::fs::create_dir(fixture.artifacts()).unwrap();
        std::fs::write(fixture.artifacts().join("g-a-jar-a-1.0.jar"), b"PK").unwrap();
        std::fs::write(fixture.artifacts().join("notes.txt"), b"x").unwrap();

        fixture
            .getrun(["g", "a", "1.0", "com.example.Main"])
            .assert()
            .code(5)
            .stdout(predicate::str::contains(
                "cp=artifacts/g-a-jar-a-1.0.jar main=com.example.Main",
            ))
            .stderr(predicate::str::contains("skipping download"));
    }

    #[test]
    fn resolves_into_empty_workspace() {
        let fixture = Fixture::new("echo \"cp=$2\"");
        fixture.publish(
            "app",
            "1.0",
            "<dependency><groupId>g</groupId><artifactId>lib</artifactId><version>2.0</version></dependency>",
        );
        fixture.publish("lib", "2.0", "");

        fixture
            .getrun(["g", "app", "1.0", "Main"])
            .assert()
            .success()
            .stdout(predicate::str::contains("artifacts/g-app-jar-app-1.0.jar"))
            .stdout(predicate::str::contains("artifacts/g-lib-jar-lib-2.0.jar"));

        assert!(fixture.artifacts().join("g-app-jar-app-1.0.jar").exists());
        assert!(fixture.artifacts().join("g-lib-jar-lib-2.0.jar").exists());
        assert!(fixture.artifacts().join(".getrun.toml").exists());
    }

    #[test]
    fn missing_dependency_fails_without_cache() {
        let fixture = Fixture::new("exit 0");
        fixture.publish(
            "app",
            "1.0",
            "<dependency><groupId>g</groupId><artifactId>gone</artifactId><version>1</version></dependency>",
        );

        fixture
            .getrun(["g", "app", "1.0", "Main"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("module not found: g:gone:1"))
            .stderr(predicate::str::contains("Dependencies not found"));

        assert!(!fixture.artifacts().exists());
    }

    #[test]
    fn other_coordinate_is_refused_until_refresh() {
        let fixture = Fixture::new("echo \"cp=$2\"");
        fixture.publish("app", "1.0", "");
        fixture.publish("app", "2.0", "");

        fixture.getrun(["g", "app", "1.0", "Main"]).assert().success();

        fixture
            .getrun(["g", "app", "2.0", "Main"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("--refresh"));

        fixture
            .getrun(["g", "app", "2.0", "Main"])
            .arg("--refresh")
            .assert()
            .success()
            .stdout(predicate::str::contains("artifacts/g-app-jar-app-2.0.jar"));
    }

    #[test]
    fn sigterm_stops_the_running_child() {
        let fixture = Fixture::new("echo $$ > child.pid\nexec sleep 30");
        std::fs::create_dir(fixture.artifacts()).unwrap();

        let mut getrun = std::process::Command::new(env!("CARGO_BIN_EXE_getrun"))
            .env_remove("GETRUN_CONFIG")
            .env_remove("RUST_LOG")
            .current_dir(fixture.root())
            .arg("--config")
            .arg(fixture.root().join("config.toml"))
            .args(["g", "a", "1.0", "Main"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let pid_file = fixture.root().join("child.pid");
        let child_pid = wait_for(Duration::from_secs(10), || {
            std::fs::read_to_string(&pid_file)
                .ok()
                .and_then(|s| s.trim().parse::<libc::pid_t>().ok())
        })
        .expect("child never started");

        assert_eq!(unsafe { libc::kill(getrun.id() as libc::pid_t, libc::SIGTERM) }, 0);

        let status = wait_for(Duration::from_secs(10), || getrun.try_wait().unwrap())
            .expect("getrun did not exit after SIGTERM");
        assert_eq!(status.code(), Some(128 + libc::SIGTERM));
        assert_eq!(unsafe { libc::kill(child_pid, 0) }, -1);
    }

    /// Poll `check` until it yields a value or `limit` passes
    fn wait_for<T>(limit: Duration, mut check: impl FnMut() -> Option<T>) -> Option<T> {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if let Some(value) = check() {
                return Some(value);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        None
    }

    #[test]
    fn missing_java_is_a_launch_failure() {
        let fixture = Fixture::new("exit 0");
        std::fs::remove_file(fixture.root().join("java")).unwrap();
        std::fs::create_dir(fixture.artifacts()).unwrap();

        fixture
            .getrun(["g", "a", "1.0", "Main"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("JAVA_HOME"));
    }
}
