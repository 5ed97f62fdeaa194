//! Tests for the generated image descriptor and scripts

mod common;

use common::Fixture;
use convenient_role::RoleKind;
use rolezel::{ArtifactGenerator, GenerateError};

#[test]
fn test_descriptor_release_mode() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let dockerfile = ArtifactGenerator::new(&config)
        .image_descriptor(&fixture.myrole())
        .unwrap();

    assert!(dockerfile.starts_with("FROM foo-role-base:6.28.30\n"));
    assert!(dockerfile.contains("LABEL \"maintainer\"="));
    assert!(dockerfile.contains("LABEL \"role\"=\"myrole\" \"version\"=\"3.14.15\""));
    assert!(dockerfile.contains("ADD root /"));
    assert!(dockerfile.contains("ENTRYPOINT [\"/bin/bash\",\"/opt/rolezel/run.sh\"]"));
}

#[test]
fn test_descriptor_dev_mode_drops_maintainer_only() {
    let fixture = Fixture::new();
    let release_config = fixture.config();
    let dev_config = fixture.config().with_dev(true);
    let role = fixture.myrole();

    let release = ArtifactGenerator::new(&release_config)
        .image_descriptor(&role)
        .unwrap();
    let dev = ArtifactGenerator::new(&dev_config).image_descriptor(&role).unwrap();

    assert!(!dev.contains("maintainer"));
    assert!(dev.contains("FROM foo-role-base:6.28.30"));
    assert!(dev.contains("LABEL \"role\"=\"myrole\" \"version\"=\"3.14.15\""));

    let stripped: Vec<&str> = release
        .lines()
        .filter(|line| !line.contains("maintainer"))
        .collect();
    let dev_lines: Vec<&str> = dev.lines().collect();
    // Release output minus the maintainer block equals the dev output
    assert_eq!(
        stripped.iter().filter(|l| !l.is_empty()).collect::<Vec<_>>(),
        dev_lines.iter().filter(|l| !l.is_empty()).collect::<Vec<_>>()
    );
}

#[test]
fn test_descriptor_dev_release() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let mut role = fixture.myrole();
    role.release.dev = true;

    let dockerfile = ArtifactGenerator::new(&config).image_descriptor(&role).unwrap();
    assert!(!dockerfile.contains("maintainer"));
}

#[test]
fn test_composite_run_script() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let role = fixture.myrole();
    assert_eq!(role.kind(), RoleKind::Supervised);

    let script = ArtifactGenerator::new(&config).run_script(&role).unwrap();

    assert!(script.starts_with("#!/bin/bash\n"));
    assert!(script.contains("configgin"));
    assert!(script.contains("/var/vcap/jobs-src/tor/templates/data/properties.sh.erb"));
    assert!(script.contains("/var/vcap/jobs/tor/data/properties.sh"));
    assert!(script.contains("/var/vcap/jobs-src/new_hostname/monit"));
    assert!(script.contains("/opt/rolezel/monitrc.erb"));
    assert!(script.contains("/etc/monitrc"));
    assert!(script.contains("source /opt/rolezel/startup/myrole.sh"));
    assert!(script.contains("\"templates\":[{\"name\":\"new_hostname\"},{\"name\":\"tor\"}]"));
    assert!(script.contains("127.0.0.1:8500"));
    assert!(script.trim_end().ends_with("exec monit -vI"));
}

#[test]
fn test_simple_run_script() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let role = fixture.foorole();
    assert_eq!(role.kind(), RoleKind::Direct);

    let script = ArtifactGenerator::new(&config).run_script(&role).unwrap();

    assert!(script.contains("/var/vcap/jobs/tor/bin/run"));
    assert!(script.contains("source /opt/rolezel/startup/foorole.sh"));
    assert!(!script.contains("monit -vI"));
    assert!(!script.contains("/etc/monitrc"));
}

#[test]
fn test_supervised_override_on_single_job() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let mut role = fixture.foorole();
    role.run.supervised = Some(true);

    let script = ArtifactGenerator::new(&config).run_script(&role).unwrap();
    assert!(script.contains("exec monit -vI"));
    assert!(script.contains("\"templates\":[{\"name\":\"tor\"}]"));
}

#[test]
fn test_direct_override_on_composite_role_is_rejected() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let mut role = fixture.myrole();
    role.run.supervised = Some(false);

    let err = ArtifactGenerator::new(&config).run_script(&role).unwrap_err();
    assert!(matches!(err, GenerateError::DirectJobCount { count: 2, .. }));
}

#[test]
fn test_run_script_requires_template_dir() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let mut role = fixture.foorole();
    role.jobs[0].path = fixture.root().join("release/tor/jobs/missing");

    let err = ArtifactGenerator::new(&config).run_script(&role).unwrap_err();
    assert!(matches!(err, GenerateError::MissingTemplateDir { .. }));
}

#[test]
fn test_run_script_rejects_unsafe_job_name() {
    let fixture = Fixture::new();
    let config = fixture.config();
    let mut role = fixture.foorole();
    role.jobs[0].name = "tor/../../etc".to_string();

    let err = ArtifactGenerator::new(&config).run_script(&role).unwrap_err();
    assert!(matches!(err, GenerateError::Naming(_)));
}

#[test]
fn test_startup_script_sources_role_scripts() {
    let fixture = Fixture::new();
    let config = fixture.config();

    let script = ArtifactGenerator::new(&config)
        .startup_script(&fixture.myrole())
        .unwrap();

    let lines: Vec<&str> = script.lines().filter(|l| l.starts_with("source")).collect();
    assert_eq!(
        lines,
        vec![
            "source /opt/rolezel/startup/common.sh",
            "source /opt/rolezel/startup/myrole/myrole.sh",
        ]
    );
}
