//! Shared fixture: a small `tor` release with two roles.
//!
//! ```text
//! release/tor/LICENSE.md
//! release/tor/jobs/new_hostname/{job.MF, monit, templates/bin/run.erb}
//! release/tor/jobs/tor/{job.MF, monit, templates/bin/monit_debugger, templates/data/properties.sh.erb}
//! release/tor/packages/tor/tor/src/LICENSE.txt
//! compiled/tor/bar
//! compiled/libevent/libevent/LICENSE
//! scripts/myrole.sh
//! ```

#![allow(dead_code)]

use rolezel::{BuilderConfig, Job, Package, Release, Role};
use convenient_role::{JobTemplate, RunConfig};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const REPOSITORY: &str = "foo";
pub const VERSION: &str = "3.14.15";
pub const BASE_IMAGE_VERSION: &str = "6.28.30";

pub struct Fixture {
    pub temp: TempDir,
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let release = root.join("release/tor");

        write(&release.join("LICENSE.md"), "tor release license\n");
        write(&release.join("README.md"), "not a license\n");

        let new_hostname = release.join("jobs/new_hostname");
        write(&new_hostname.join("job.MF"), "name: new_hostname\n");
        write(&new_hostname.join("monit"), "check process new_hostname\n");
        write(&new_hostname.join("templates/bin/run.erb"), "#!/bin/bash\nhostname\n");

        let tor = release.join("jobs/tor");
        write(&tor.join("job.MF"), "name: tor\n");
        write(&tor.join("monit"), "check process tor\n");
        write(&tor.join("templates/bin/monit_debugger"), "#!/bin/bash\n");
        write(&tor.join("templates/data/properties.sh.erb"), "export TOR=1\n");

        write(
            &release.join("packages/tor/tor/src/LICENSE.txt"),
            "tor source license\n",
        );

        write(&root.join("compiled/tor/bar"), "compiled tor\n");
        write(&root.join("compiled/libevent/libevent/LICENSE"), "libevent license\n");
        write(&root.join("compiled/libevent/lib/libevent.so"), "binary\n");

        write(&root.join("scripts/myrole.sh"), "echo myrole\n");

        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("output")
    }

    pub fn config(&self) -> BuilderConfig {
        BuilderConfig::new(
            REPOSITORY,
            self.root().join("compiled"),
            self.output_dir(),
            VERSION,
            BASE_IMAGE_VERSION,
        )
    }

    pub fn release(&self) -> Release {
        Release {
            name: "tor".to_string(),
            version: "0+dev.1".to_string(),
            path: self.root().join("release/tor"),
            dev: false,
        }
    }

    pub fn tor_package(&self) -> Package {
        Package {
            name: "tor".to_string(),
            fingerprint: "tor-fingerprint".to_string(),
            source_path: Some(self.root().join("release/tor/packages/tor")),
        }
    }

    pub fn libevent_package(&self) -> Package {
        Package {
            name: "libevent".to_string(),
            fingerprint: "libevent-fingerprint".to_string(),
            source_path: None,
        }
    }

    pub fn new_hostname_job(&self) -> Job {
        Job {
            name: "new_hostname".to_string(),
            path: self.root().join("release/tor/jobs/new_hostname"),
            templates: vec![JobTemplate {
                source: "bin/run.erb".to_string(),
                destination: "bin/run".to_string(),
            }],
            packages: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn tor_job(&self) -> Job {
        let mut properties = BTreeMap::new();
        let _ = properties.insert("tor.hostname".to_string(), serde_json::json!("localhost"));
        Job {
            name: "tor".to_string(),
            path: self.root().join("release/tor/jobs/tor"),
            templates: vec![
                JobTemplate {
                    source: "data/properties.sh.erb".to_string(),
                    destination: "data/properties.sh".to_string(),
                },
                JobTemplate {
                    source: "bin/monit_debugger".to_string(),
                    destination: "bin/monit_debugger".to_string(),
                },
            ],
            packages: vec![self.libevent_package(), self.tor_package()],
            properties,
        }
    }

    /// Supervised role with two jobs and a custom startup script
    pub fn myrole(&self) -> Role {
        Role {
            name: "myrole".to_string(),
            jobs: vec![self.new_hostname_job(), self.tor_job()],
            run: RunConfig::default(),
            release: self.release(),
            scripts: vec![self.root().join("scripts/myrole.sh")],
        }
    }

    /// Direct role with the single `tor` job
    pub fn foorole(&self) -> Role {
        Role {
            name: "foorole".to_string(),
            jobs: vec![self.tor_job()],
            run: RunConfig::default(),
            release: self.release(),
            scripts: Vec::new(),
        }
    }

    pub fn roles(&self) -> Vec<Role> {
        vec![self.myrole(), self.foorole()]
    }
}
