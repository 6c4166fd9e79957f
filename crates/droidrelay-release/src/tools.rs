//! Android and release tool handlers.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use droidrelay_core::{
    diagnostics, normalize_name, CancellationToken, CommandExecutor, CommandHandler,
    CommandRouter, HandlerOutput, SecretProvider, ToolCommand,
};
use serde_json::{Map, Value};

use crate::backend::ReleaseBackend;
use crate::context::{capitalize_variant, ArtifactType, ReleaseContext, SigningCredentials};
use crate::gradle::{self, TestType};
use crate::pipeline::ReleasePipeline;
use crate::token::TokenProvider;

fn credentials_from(command: &ToolCommand, secrets: &dyn SecretProvider) -> SigningCredentials {
    SigningCredentials {
        keystore_path: command.str_arg("keystorePath"),
        keystore_password: command.str_arg("keystorePassword"),
        key_alias: command.str_arg("keyAlias"),
        key_password: command.str_arg("keyPassword"),
    }
    .with_fallback(secrets)
}

// ---------------------------------------------------------------------------
// run_android_tests
// ---------------------------------------------------------------------------

/// Runs unit or instrumented tests through the Gradle wrapper.
pub struct AndroidTestsHandler {
    executor: Arc<dyn CommandExecutor>,
}

impl AndroidTestsHandler {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl CommandHandler for AndroidTestsHandler {
    fn name(&self) -> &'static str {
        "run_android_tests"
    }

    fn synonyms(&self) -> &'static [&'static str] {
        &["run_tests", "run_unit_tests", "android_tests"]
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        &["projectPath"]
    }

    async fn handle(&self, command: &ToolCommand, cancel: &CancellationToken) -> HandlerOutput {
        let project = PathBuf::from(command.str_arg("projectPath").unwrap_or_default());
        let module = command.str_arg("moduleName").unwrap_or_default();
        let variant = capitalize_variant(&command.str_arg("buildVariant").unwrap_or_else(|| "Debug".to_string()));
        let test_type = match command.str_arg("testType") {
            None => TestType::Unit,
            Some(raw) => match TestType::parse(&raw) {
                Some(t) => t,
                None => {
                    return HandlerOutput::visible(format!(
                        "Unknown testType \"{raw}\": use \"unit\" or \"instrumented\"."
                    ))
                }
            },
        };

        if let Err(e) = gradle::check_task_inputs(&module, &variant) {
            return HandlerOutput::visible(format!("Tests not run: {e}."));
        }

        let line = gradle::test_command(&module, &variant, test_type);
        let result = self.executor.run(&line, Some(project.as_path()), cancel).await;
        let hidden = format!("$ {line}\n{}", result.to_formatted_string());

        let visible = if result.success() {
            format!("Tests passed ({variant}).")
        } else {
            format!(
                "Tests failed (exit code {}).\n{}",
                result.exit_code,
                diagnostics::explain_result(&result, true)
            )
        };
        HandlerOutput::visible(visible).with_hidden(hidden)
    }
}

// ---------------------------------------------------------------------------
// release_app
// ---------------------------------------------------------------------------

/// Runs the full release pipeline.
pub struct ReleaseHandler {
    pipeline: Arc<ReleasePipeline>,
    secrets: Arc<dyn SecretProvider>,
}

impl ReleaseHandler {
    pub fn new(pipeline: Arc<ReleasePipeline>, secrets: Arc<dyn SecretProvider>) -> Self {
        Self { pipeline, secrets }
    }

    fn wants_signing(command: &ToolCommand) -> bool {
        command.bool_arg("sign").unwrap_or(true)
    }
}

#[async_trait]
impl CommandHandler for ReleaseHandler {
    fn name(&self) -> &'static str {
        "release_app"
    }

    fn synonyms(&self) -> &'static [&'static str] {
        &["build_and_publish", "build_release", "publish_app"]
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        &["projectPath", "packageName"]
    }

    /// Signing credentials must be resolvable before any build starts.
    fn missing_preconditions(&self, command: &ToolCommand) -> Vec<String> {
        if !Self::wants_signing(command) {
            return Vec::new();
        }
        credentials_from(command, self.secrets.as_ref()).missing()
    }

    async fn handle(&self, command: &ToolCommand, cancel: &CancellationToken) -> HandlerOutput {
        let artifact_type = match command.str_arg("artifactType") {
            None => ArtifactType::Apk,
            Some(raw) => match ArtifactType::parse(&raw) {
                Some(t) => t,
                None => {
                    return HandlerOutput::visible(format!(
                        "Unknown artifactType \"{raw}\": use \"apk\" or \"aab\"."
                    ))
                }
            },
        };

        let ctx = ReleaseContext::new(
            command.str_arg("projectPath").unwrap_or_default(),
            command.str_arg("packageName").unwrap_or_default(),
        )
        .with_module(command.str_arg("moduleName").unwrap_or_else(|| "app".to_string()))
        .with_variant(&command.str_arg("buildVariant").unwrap_or_else(|| "Release".to_string()))
        .with_artifact_type(artifact_type)
        .with_sign(Self::wants_signing(command))
        .with_credentials(credentials_from(command, self.secrets.as_ref()));

        let report = self.pipeline.run(ctx, cancel).await;
        HandlerOutput {
            visible: report.visible,
            hidden: report.hidden,
            follow_up: report.follow_up,
        }
    }
}

// ---------------------------------------------------------------------------
// acquire_access_token
// ---------------------------------------------------------------------------

/// Fetches a fresh access token and hands it to the model, never to the UI.
pub struct AccessTokenHandler {
    tokens: Arc<dyn TokenProvider>,
}

impl AccessTokenHandler {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl CommandHandler for AccessTokenHandler {
    fn name(&self) -> &'static str {
        "acquire_access_token"
    }

    fn synonyms(&self) -> &'static [&'static str] {
        &["get_access_token", "get_token"]
    }

    async fn handle(&self, _command: &ToolCommand, _cancel: &CancellationToken) -> HandlerOutput {
        match self.tokens.acquire_access_token().await {
            Ok(token) => HandlerOutput::visible(format!(
                "Access token acquired (valid for {} s).",
                token.ttl_seconds
            ))
            .with_hidden(format!(
                "Access token: {} (ttl {} s)",
                token.value, token.ttl_seconds
            )),
            Err(e) => HandlerOutput::visible(format!("Could not get an access token: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// publish_version
// ---------------------------------------------------------------------------

/// Creates a version draft from the fields the model supplied.
pub struct PublishVersionHandler {
    backend: Arc<dyn ReleaseBackend>,
}

impl PublishVersionHandler {
    pub fn new(backend: Arc<dyn ReleaseBackend>) -> Self {
        Self { backend }
    }
}

/// Every argument except `packageName` and `token`, skipping nulls.
pub fn draft_fields(command: &ToolCommand) -> Map<String, Value> {
    command
        .arguments
        .iter()
        .filter(|(key, _)| !matches!(normalize_name(key).as_str(), "package_name" | "token"))
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[async_trait]
impl CommandHandler for PublishVersionHandler {
    fn name(&self) -> &'static str {
        "publish_version"
    }

    fn synonyms(&self) -> &'static [&'static str] {
        &["create_version_draft", "create_version", "draft_version"]
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        &["packageName", "token"]
    }

    async fn handle(&self, command: &ToolCommand, _cancel: &CancellationToken) -> HandlerOutput {
        let package = command.str_arg("packageName").unwrap_or_default();
        let token = command.str_arg("token").unwrap_or_default();
        let fields = draft_fields(command);

        match self
            .backend
            .create_version_draft(&package, &token, &fields)
            .await
        {
            Ok(body) => HandlerOutput::visible(format!("Version draft created for {package}."))
                .with_hidden(format!("Version draft response:\n{body}")),
            Err(e) => HandlerOutput::visible(format!("Version draft for {package} failed."))
                .with_hidden(format!("Version draft error: {e}")),
        }
    }
}

/// Register the four release handlers on `router`.
pub fn register_release_tools(
    router: &mut CommandRouter,
    executor: Arc<dyn CommandExecutor>,
    tokens: Arc<dyn TokenProvider>,
    backend: Arc<dyn ReleaseBackend>,
    secrets: Arc<dyn SecretProvider>,
    sdk_root: Option<PathBuf>,
) -> droidrelay_core::Result<()> {
    let pipeline = Arc::new(ReleasePipeline::new(
        executor.clone(),
        tokens.clone(),
        backend.clone(),
        sdk_root,
    ));
    router.register(Arc::new(AndroidTestsHandler::new(executor)))?;
    router.register(Arc::new(ReleaseHandler::new(pipeline, secrets)))?;
    router.register(Arc::new(AccessTokenHandler::new(tokens)))?;
    router.register(Arc::new(PublishVersionHandler::new(backend)))?;
    Ok(())
}
