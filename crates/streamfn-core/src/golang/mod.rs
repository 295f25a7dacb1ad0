//! Go backend.
//!
//! Turns a Go handler source into a standalone executable:
//!
//! ```text
//! handler.go ─┬─► merge ◄── main.go.tmpl (name, host, port)
//!             │
//!             └─► rewrite imports ─► fix imports ─► <tmp>/streamfn_*/app.go
//!                                                     │ go mod init <name>
//!                                                     │ go get -u yomo, y3-codec
//!                                                     │ go mod download
//!                                                     ▼
//!                                    go build -ldflags "-s -w" -o <dir>/sl
//! ```

mod artifact;
mod imports;
mod rewriter;
mod syntax;
mod template;
mod toolchain;
mod workspace;

use std::path::{Path, PathBuf};

use crate::backend::{Backend, BackendConfig, Registry};
use crate::error::{Error, Result};
use crate::gomod::RUNTIME_MODULE;
use crate::options::BuildOptions;

pub use artifact::{artifact_path, Platform, ARTIFACT_NAME};
pub use imports::fix_imports;
pub use rewriter::{add_named_import, rewrite, CLIENT_ALIAS, CLIENT_PATH, LOG_ALIAS, LOG_PATH};
pub use syntax::{assumed_name, format_import_block, parse_file, render, FileSet, ImportSpec, Position, SourceFile};
pub use template::{go_quote, merge, read_source, render_template, TemplateContext, MAIN_FUNC_TEMPLATE};
pub use toolchain::{run_steps, GoToolchain, SystemRunner, ToolCommand, ToolOutput, ToolRunner, MODULE_MODE};
pub use workspace::{CleanupGuard, Workspace, SOURCE_FILE, WORKSPACE_PREFIX};

/// Extension handled by this backend.
pub const EXTENSION: &str = ".go";

/// Codec library fetched next to the runtime.
pub const CODEC_MODULE: &str = "github.com/yomorun/y3-codec-golang";

/// Register the Go backend.
pub fn register(registry: &mut Registry) {
    registry.register(EXTENSION, create);
}

fn create(config: &BackendConfig) -> Box<dyn Backend> {
    Box::new(GolangBackend::from_config(config))
}

/// Lifecycle of one backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Uninitialized,
    Initialized,
    Built,
    Exited,
    Failed,
}

/// State produced by a successful `init`.
#[derive(Debug, Clone)]
struct Prepared {
    opts: BuildOptions,
    workspace: Workspace,
    source: PathBuf,
}

/// Builds Go handlers against the streaming runtime.
pub struct GolangBackend {
    toolchain: GoToolchain,
    runner: Box<dyn ToolRunner>,
    platform: Platform,
    workspace_root: PathBuf,
    stage: Stage,
    workspace: Option<Workspace>,
    prepared: Option<Prepared>,
    target: Option<PathBuf>,
}

impl GolangBackend {
    pub fn new(toolchain: GoToolchain) -> Self {
        Self {
            toolchain,
            runner: Box::new(SystemRunner),
            platform: Platform::current(),
            workspace_root: std::env::temp_dir(),
            stage: Stage::Uninitialized,
            workspace: None,
            prepared: None,
            target: None,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let toolchain = match &config.go {
            Some(go) => GoToolchain::with_go(go),
            None => GoToolchain::detect(),
        };
        Self::new(toolchain)
    }

    /// Execute tool commands through `runner`.
    pub fn with_runner(mut self, runner: Box<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Name artifacts for `platform`.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Create workspaces under `root` instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Finalized program inside the workspace, once `init` succeeded.
    pub fn source(&self) -> Option<&Path> {
        self.prepared.as_ref().map(|p| p.source.as_path())
    }

    /// Artifact path, once `build` reached compilation.
    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Workspace directory, once allocated.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.workspace.as_ref().map(Workspace::dir)
    }

    fn expect_stage(&mut self, expected: Stage, call: &str) -> Result<()> {
        if self.stage == expected {
            return Ok(());
        }
        let err = Error::InvalidState(format!(
            "{call} called in stage {:?}, expected {:?}",
            self.stage, expected
        ));
        self.stage = Stage::Failed;
        Err(err)
    }

    fn advance(&mut self, result: Result<()>, next: Stage) -> Result<()> {
        self.stage = if result.is_ok() { next } else { Stage::Failed };
        result
    }

    fn try_init(&mut self, opts: BuildOptions) -> Result<()> {
        let user = read_source(&opts.filename)?;

        let ctx = TemplateContext {
            name: &opts.name,
            host: &opts.host,
            port: opts.port,
        };
        let main_func = render_template(MAIN_FUNC_TEMPLATE, &ctx)?;
        let merged = merge(&user, &main_func);

        let fset = FileSet::new(opts.filename.display().to_string(), merged)?;
        let code = rewrite(&fset)?;

        let workspace = Workspace::create_in(&self.workspace_root)?;
        self.workspace = Some(workspace.clone());

        let fixed = fix_imports(&workspace.source_path(), &code)?;
        let source = workspace.write_source(&fixed)?;

        let mod_init = self.toolchain.mod_init(workspace.dir(), &opts.name);
        run_steps(self.runner.as_ref(), &[mod_init], |_, output| Error::ManifestInit { output })?;

        // TODO: skip the rebuild when a checksum of `fixed` matches the previous build.
        tracing::debug!("initialized {} in {}", opts.name, workspace.dir().display());
        self.prepared = Some(Prepared {
            opts,
            workspace,
            source,
        });
        Ok(())
    }

    fn try_build(&mut self, clean: bool) -> Result<()> {
        let Prepared {
            opts,
            workspace,
            source,
        } = self
            .prepared
            .clone()
            .ok_or_else(|| Error::InvalidState("build called before init".to_string()))?;

        if !source.exists() {
            return Err(Error::MissingFile(source));
        }

        let dir = workspace.dir();
        let dependencies = [
            self.toolchain.get_latest(dir, RUNTIME_MODULE),
            self.toolchain.get_latest(dir, CODEC_MODULE),
            self.toolchain.mod_download(dir),
        ];
        run_steps(self.runner.as_ref(), &dependencies, |step, output| {
            Error::DependencyFetch {
                step: step.label(),
                output,
            }
        })?;

        let _cleanup = clean.then(|| workspace.cleanup_guard());

        let target = artifact_path(&opts.filename, self.platform)?;
        self.target = Some(target.clone());

        let build = self.toolchain.build(dir, &target, &source);
        run_steps(self.runner.as_ref(), &[build], |_, output| Error::Compile { output })?;

        tracing::debug!("built {}", target.display());
        Ok(())
    }

    fn try_run(&self) -> Result<()> {
        let target = self.target.clone().unwrap_or_default();
        let run_error = |reason: String| Error::Run {
            target: target.clone(),
            reason,
        };

        tracing::info!("Run: {}", target.display());
        if !target.is_file() {
            return Err(run_error("artifact not found".to_string()));
        }

        let cwd = std::env::current_dir()
            .map_err(|e| run_error(format!("cannot determine working directory: {e}")))?;
        let cmd = self.toolchain.run_artifact(&target, &cwd);
        let output = self
            .runner
            .interactive(&cmd)
            .map_err(|e| run_error(format!("failed to start: {e}")))?;

        if output.success {
            return Ok(());
        }
        Err(run_error(match output.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }))
    }
}

impl Backend for GolangBackend {
    fn init(&mut self, opts: BuildOptions) -> Result<()> {
        self.expect_stage(Stage::Uninitialized, "init")?;
        let result = self.try_init(opts);
        self.advance(result, Stage::Initialized)
    }

    fn build(&mut self, clean: bool) -> Result<()> {
        self.expect_stage(Stage::Initialized, "build")?;
        let result = self.try_build(clean);
        self.advance(result, Stage::Built)
    }

    fn run(&mut self) -> Result<()> {
        if self.stage != Stage::Built {
            self.stage = Stage::Failed;
            return Err(Error::Run {
                target: self.target.clone().unwrap_or_default(),
                reason: "no artifact has been built".to_string(),
            });
        }
        let result = self.try_run();
        self.advance(result, Stage::Exited)
    }

    fn artifact(&self) -> Option<&Path> {
        self.target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const HANDLER: &str = r#"package main

import (
	"fmt"
	"os"
)

// Handler prints every value it sees.
func Handler(rxstream rx.RxStream) rx.RxStream {
	return rxstream.Map(func(v interface{}) (interface{}, error) {
		fmt.Println(v)
		return v, nil
	})
}
"#;

    /// Records every command; fails the first one whose label starts with `fail_on`.
    #[derive(Clone, Default)]
    struct FakeGo {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
        artifact: Option<&'static str>,
        last_run: Arc<Mutex<Option<ToolCommand>>>,
    }

    impl FakeGo {
        fn failing(step: &'static str) -> Self {
            Self {
                fail_on: Some(step),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolRunner for FakeGo {
        fn capture(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
            let label = cmd.label();
            self.calls.lock().unwrap().push(label.clone());

            if self.fail_on.is_some_and(|step| label.starts_with(step)) {
                return Ok(ToolOutput {
                    success: false,
                    code: Some(1),
                    combined: format!("{label}: boom\n"),
                });
            }

            if let (Some(script), Some("build")) = (self.artifact, cmd.args.first().map(String::as_str)) {
                let target = &cmd.args[4];
                fs::write(target, script)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(target, fs::Permissions::from_mode(0o755))?;
                }
            }

            Ok(ToolOutput {
                success: true,
                code: Some(0),
                combined: String::new(),
            })
        }

        fn interactive(&self, cmd: &ToolCommand) -> io::Result<ToolOutput> {
            self.calls.lock().unwrap().push(cmd.program.display().to_string());
            *self.last_run.lock().unwrap() = Some(cmd.clone());
            SystemRunner.interactive(cmd)
        }
    }

    struct Fixture {
        src_dir: TempDir,
        ws_root: TempDir,
        runner: FakeGo,
    }

    impl Fixture {
        fn new(source: &str, runner: FakeGo) -> Self {
            let src_dir = TempDir::new().unwrap();
            fs::write(src_dir.path().join("handler.go"), source).unwrap();
            Self {
                src_dir,
                ws_root: TempDir::new().unwrap(),
                runner,
            }
        }

        fn options(&self) -> BuildOptions {
            BuildOptions::new(self.src_dir.path().join("handler.go"))
                .with_name("echo")
                .with_host("localhost")
                .with_port(9000)
        }

        fn backend(&self) -> GolangBackend {
            GolangBackend::new(GoToolchain::with_go("go"))
                .with_runner(Box::new(self.runner.clone()))
                .with_platform(Platform::Other)
                .with_workspace_root(self.ws_root.path())
        }

        fn workspaces(&self) -> usize {
            fs::read_dir(self.ws_root.path()).unwrap().count()
        }
    }

    #[test]
    fn test_init_writes_finalized_source() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();

        assert_eq!(backend.stage(), Stage::Initialized);
        let source = backend.source().unwrap();
        assert_eq!(source, backend.temp_dir().unwrap().join("app.go"));

        let code = fs::read_to_string(source).unwrap();
        assert!(code.contains(r#"yomoclient.NewServerless("echo").Connect("localhost", 9000)"#));
        assert!(code.contains("\tyomoclient \"github.com/yomorun/yomo/pkg/client\"\n"));
        assert!(code.contains("\tstdlog \"log\"\n"));
        assert!(code.contains("\t\"github.com/yomorun/yomo/pkg/rx\"\n"));
        assert!(code.contains("\t\"fmt\"\n"));
        assert!(!code.contains("\"os\""), "unused import should be removed:\n{code}");

        let fset = FileSet::new("app.go", code.into_bytes()).unwrap();
        let file = parse_file(&fset).unwrap();
        assert_eq!(file.functions, vec!["Handler", "main"]);

        assert_eq!(fx.runner.calls(), vec!["go mod init echo"]);
    }

    #[test]
    fn test_init_is_reproducible() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut first = fx.backend();
        let mut second = fx.backend();
        first.init(fx.options()).unwrap();
        second.init(fx.options()).unwrap();

        assert_ne!(first.temp_dir(), second.temp_dir());
        assert_eq!(
            fs::read(first.source().unwrap()).unwrap(),
            fs::read(second.source().unwrap()).unwrap()
        );
    }

    #[test]
    fn test_init_missing_file() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();
        let opts = BuildOptions::new(fx.src_dir.path().join("nope.go"));

        let err = backend.init(opts).unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
        assert_eq!(backend.stage(), Stage::Failed);
    }

    #[test]
    fn test_init_empty_file() {
        let fx = Fixture::new("", FakeGo::default());
        let mut backend = fx.backend();

        let err = backend.init(fx.options()).unwrap_err();
        assert!(matches!(err, Error::EmptySource(_)));
    }

    #[test]
    fn test_init_malformed_source_writes_nothing() {
        let fx = Fixture::new("package main\n\nfunc Handler() {\n\tif true {\n", FakeGo::default());
        let mut backend = fx.backend();

        let err = backend.init(fx.options()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "{err}");
        assert_eq!(fx.workspaces(), 0);
        assert!(backend.source().is_none());
        assert!(fx.runner.calls().is_empty());
    }

    #[test]
    fn test_init_user_main_collides() {
        let fx = Fixture::new("package main\n\nfunc main() {}\n", FakeGo::default());
        let err = fx.backend().init(fx.options()).unwrap_err();
        assert!(matches!(err, Error::Parse(msg) if msg.contains("main redeclared")));
    }

    #[test]
    fn test_init_manifest_failure_is_verbatim() {
        let fx = Fixture::new(HANDLER, FakeGo::failing("go mod init"));
        let mut backend = fx.backend();

        let err = backend.init(fx.options()).unwrap_err();
        assert!(matches!(&err, Error::ManifestInit { output } if output == "go mod init echo: boom\n"));
        // Left on disk for inspection.
        assert!(backend.temp_dir().unwrap().join("app.go").is_file());
    }

    #[test]
    fn test_build_runs_steps_in_order() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();
        backend.build(false).unwrap();

        let ws = backend.temp_dir().unwrap().to_path_buf();
        let target = fx.src_dir.path().join("sl");
        assert_eq!(backend.target(), Some(target.as_path()));
        assert_eq!(
            fx.runner.calls(),
            vec![
                "go mod init echo".to_string(),
                "go get -u github.com/yomorun/yomo".to_string(),
                "go get -u github.com/yomorun/y3-codec-golang".to_string(),
                "go mod download".to_string(),
                format!("go build -ldflags -s -w -o {} {}", target.display(), ws.join("app.go").display()),
            ]
        );
        assert!(ws.is_dir(), "non-clean build keeps the workspace");
        assert_eq!(backend.stage(), Stage::Built);
    }

    #[test]
    fn test_windows_artifact_name() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend().with_platform(Platform::Windows);
        backend.init(fx.options()).unwrap();
        backend.build(false).unwrap();

        assert_eq!(backend.target(), Some(fx.src_dir.path().join("sl.exe").as_path()));
    }

    #[test]
    fn test_clean_build_removes_workspace_on_success() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();
        backend.build(true).unwrap();

        assert!(!backend.temp_dir().unwrap().exists());
    }

    #[test]
    fn test_clean_build_removes_workspace_on_compile_failure() {
        let fx = Fixture::new(HANDLER, FakeGo::failing("go build"));
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();

        let err = backend.build(true).unwrap_err();
        assert!(matches!(err, Error::Compile { .. }));
        assert!(!backend.temp_dir().unwrap().exists());
        assert_eq!(backend.stage(), Stage::Failed);
    }

    #[test]
    fn test_clean_build_keeps_workspace_on_dependency_failure() {
        let fx = Fixture::new(HANDLER, FakeGo::failing("go get -u github.com/yomorun/yomo"));
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();

        let err = backend.build(true).unwrap_err();
        match err {
            Error::DependencyFetch { step, output } => {
                assert_eq!(step, "go get -u github.com/yomorun/yomo");
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(backend.temp_dir().unwrap().is_dir());
        assert!(backend.target().is_none());
        assert_eq!(fx.runner.calls().len(), 2, "later steps must not run");
    }

    #[test]
    fn test_build_detects_removed_source() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();
        fs::remove_file(backend.source().unwrap()).unwrap();

        let err = backend.build(false).unwrap_err();
        assert!(matches!(err, Error::MissingFile(path) if path.ends_with("app.go")));
    }

    #[test]
    fn test_build_before_init() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();

        let err = backend.build(false).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(fx.runner.calls().is_empty());
    }

    #[test]
    fn test_failed_instance_cannot_resume() {
        let fx = Fixture::new("", FakeGo::default());
        let mut backend = fx.backend();
        assert!(backend.init(fx.options()).is_err());

        fs::write(fx.src_dir.path().join("handler.go"), HANDLER).unwrap();
        let err = backend.init(fx.options()).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_run_without_artifact() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();
        backend.build(false).unwrap();

        let err = backend.run().unwrap_err();
        assert!(matches!(err, Error::Run { reason, .. } if reason == "artifact not found"));
    }

    #[test]
    fn test_run_before_build() {
        let fx = Fixture::new(HANDLER, FakeGo::default());
        let mut backend = fx.backend();

        let err = backend.run().unwrap_err();
        assert!(matches!(err, Error::Run { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_executes_artifact() {
        let runner = FakeGo {
            artifact: Some("#!/bin/sh\nexit 0\n"),
            ..Default::default()
        };
        let fx = Fixture::new(HANDLER, runner);
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();
        backend.build(true).unwrap();
        backend.run().unwrap();

        assert_eq!(backend.stage(), Stage::Exited);
        let target = fx.src_dir.path().join("sl");
        assert_eq!(fx.runner.calls().last(), Some(&target.display().to_string()));

        let run = fx.runner.last_run.lock().unwrap().clone().unwrap();
        assert_eq!(run.program, target);
        assert!(run.envs.contains(&("GO111MODULE".to_string(), "on".to_string())));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_status() {
        let runner = FakeGo {
            artifact: Some("#!/bin/sh\nexit 7\n"),
            ..Default::default()
        };
        let fx = Fixture::new(HANDLER, runner);
        let mut backend = fx.backend();
        backend.init(fx.options()).unwrap();
        backend.build(false).unwrap();

        let err = backend.run().unwrap_err();
        assert!(matches!(err, Error::Run { reason, .. } if reason == "exit status 7"));
    }
}
