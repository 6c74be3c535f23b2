//! Built-in stage table.

use bf_protocol::stage_models::{StageSpec, TimeoutCategory};

/// Stage table used when a target's settings carry no `stages` key.
///
/// Checkout, revision lookup and configure are gating: if one of them is
/// not successful nothing after it runs.
pub fn default_stages() -> Vec<StageSpec> {
    use TimeoutCategory::{Long, Short};

    vec![
        StageSpec::new("bison-version", ["{bison}", "--version"]).with_timeout(Short),
        StageSpec::new("svn/ruby", ["{svn}", "checkout", "{repository}", "{build_dir}"]).gating(),
        StageSpec::new("svn-info/ruby", ["{svn}", "info"])
            .in_build_dir()
            .with_timeout(Short)
            .gating()
            .with_capture("revision", r"^Revision: (\d+)"),
        StageSpec::new(
            "configure",
            ["./configure", "--prefix={prefix}", "--with-baseruby={driver}"],
        )
        .in_build_dir()
        .gating(),
        StageSpec::new("cc-version", ["{cc}", "--version"]).with_timeout(Short),
        StageSpec::new("miniruby", ["{make}", "miniruby"]).in_build_dir(),
        StageSpec::new("miniversion", ["./miniruby", "-v"])
            .in_build_dir()
            .with_timeout(Short),
        StageSpec::new("btest", ["{make}", "OPTS=-v -q", "btest"])
            .in_build_dir()
            .with_classifier(r"^FAIL (\d+)/", "{1}BFail"),
        StageSpec::new("test.rb", ["./miniruby", "sample/test.rb"])
            .in_build_dir()
            .with_classifier(r"^not ok/test: \d+ failed (\d+)", "{1}NotOK"),
        StageSpec::new("showflags", ["{make}", "showflags"])
            .in_build_dir()
            .with_timeout(Short),
        StageSpec::new("main", ["{make}", "main"])
            .in_build_dir()
            .with_timeout(Long),
        StageSpec::new("docs", ["{make}", "docs"]).in_build_dir(),
        StageSpec::new("version", ["./ruby", "-v"])
            .in_build_dir()
            .with_timeout(Short)
            .with_capture("version", r"([^\r\n]+)[\r\n]*\z"),
        StageSpec::new("install-nodoc", ["{make}", "install-nodoc"]).in_build_dir(),
        StageSpec::new("install-doc", ["{make}", "install-doc"]).in_build_dir(),
        StageSpec::new("test-knownbug", ["{make}", "OPTS=-v -q", "test-knownbug"])
            .in_build_dir()
            .advisory(),
        StageSpec::new("test-all", ["{make}", "TESTS=-v", "RUBYOPT=-w", "test-all"])
            .in_build_dir()
            .with_timeout(Long)
            .with_classifier(
                r"^\d+ tests, \d+ assertions, (\d+) failures, (\d+) errors, (\d+) skips",
                "{1}F{2}E",
            ),
    ]
}
