//! Command dispatch.
//!
//! Maps one decoded request onto the registry or the process runner and wraps
//! the outcome in a response envelope. Every domain or collaborator failure is
//! folded into a `success: false` response; nothing here ends the session.

use crate::state::HostState;
use modex_core::{ProcessRunner, Registry, Result};
use modex_proto::{Incoming, InstalledPackage, Request, Response};
use tracing::{debug, warn};

/// Answer any decoded frame, including unknown or malformed commands.
pub fn handle_incoming(incoming: &Incoming, state: &mut HostState) -> Response {
    match incoming {
        Incoming::Command(request) => handle_request(request, state),
        Incoming::Unknown { tag } => {
            warn!(tag = %tag, "unknown command");
            Response::unknown(tag)
        }
        Incoming::Malformed { tag, reason } => {
            warn!(tag = %tag, reason = %reason, "malformed request");
            Response::error(tag, format!("invalid request: {reason}"))
        }
    }
}

/// Handle a request and produce its response.
pub fn handle_request(request: &Request, state: &mut HostState) -> Response {
    let tag = request.tag();
    debug!(tag, "handling request");

    let HostState { registry, runner } = state;

    let result = match request {
        Request::CreateVenv { name, path } => registry
            .create(name, path, |target| runner.create_environment(target))
            .map(|env| Response::with_data(tag, &env)),

        Request::ListVirtualEnvs => Ok(Response::with_data(tag, &registry.list())),

        Request::SetActiveVirtualEnv { id } => registry
            .set_active(*id)
            .map(|()| Response::with_data(tag, &registry.list())),

        Request::InstallPackage {
            package_name,
            version,
        } => install(registry, runner, package_name, version)
            .map(|installed| Response::with_data(tag, &installed)),

        Request::GetModuleHelp { module_name } => registry
            .active_environment_path()
            .and_then(|env| runner.module_help(env, module_name))
            .map(|text| Response::with_data(tag, &text)),

        Request::GetModuleAttributes { module_name } => registry
            .active_environment_path()
            .and_then(|env| runner.module_attributes(env, module_name))
            .map(|attrs| Response::with_data(tag, &attrs)),

        Request::SearchModuleAttributes { module_name, query } => registry
            .active_environment_path()
            .and_then(|env| runner.search_module_attributes(env, module_name, query))
            .map(|attrs| Response::with_data(tag, &attrs)),
    };

    result.unwrap_or_else(|e| {
        warn!(tag, error = %e, "request failed");
        Response::error(tag, e.to_string())
    })
}

/// Install into the active environment and record the package on success.
fn install(
    registry: &mut Registry,
    runner: &ProcessRunner,
    package: &str,
    version: &str,
) -> Result<InstalledPackage> {
    let (id, path) = {
        let env = registry.active_environment()?;
        (env.id, env.path.clone())
    };
    let installed = runner.install(&path, package, version)?;
    registry.record_package(id, installed.clone())?;
    Ok(installed)
}
