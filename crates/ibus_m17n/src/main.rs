use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_std::stream::StreamExt;
use clap::Parser;
use event_listener::{Event, Listener};
use ibus_utils::{engines_xml, get_ibus_address, IBusComponent, IBusEngineDesc};
use log::{info, warn};
use m17n_lib::registry::{engine_desc, parse_method_list, AUTHORS};
use m17n_lib::{Config, FactoryRegistry, InputMethod, MethodLibrary, TableLibrary};
use zbus::zvariant::Value;
use zbus::{connection, proxy, AuthMechanism, Connection, MessageStream};

use crate::cli::Args;
use crate::factory::{EngineFactory, Factory};

mod cli;
mod engine;
mod factory;

const REQUESTED_NAME: &str = "org.freedesktop.IBus.M17N";
const FACTORY_PATH: &str = "/org/freedesktop/IBus/Factory";

#[proxy(
    interface = "org.freedesktop.IBus",
    default_service = "org.freedesktop.IBus",
    default_path = "/org/freedesktop/IBus"
)]
trait IBus {
    fn register_component(&self, component: &Value<'_>) -> zbus::Result<()>;
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Start a detached copy of this process without the daemonize flag.
fn daemonize() -> Result<()> {
    let exe = std::env::current_exe().context("locating the engine executable")?;
    let args = std::env::args()
        .skip(1)
        .filter(|arg| arg != "-d" && arg != "--daemonize");
    let child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("spawning the background engine")?;
    info!("engine running in background as pid {}", child.id());
    Ok(())
}

fn open_methods(library: &TableLibrary, args: &Args) -> Result<Vec<Box<dyn InputMethod>>> {
    let wanted: Vec<(String, String)> = if args.all || args.methods.is_empty() {
        library
            .list_methods()
            .into_iter()
            .map(|m| (m.language, m.name))
            .collect()
    } else {
        let mut wanted = Vec::new();
        for arg in &args.methods {
            let Some(methods) = parse_method_list(arg) else {
                bail!("invalid method list {:?}, expected lang:name[,name...]", arg);
            };
            wanted.extend(methods);
        }
        wanted
    };

    let mut methods = Vec::new();
    for (language, name) in wanted {
        match library.open(&language, &name) {
            Ok(method) => methods.push(method),
            Err(err) => warn!("skipping {}:{}: {}", language, name, err),
        }
    }
    Ok(methods)
}

fn component(engines: Vec<IBusEngineDesc>) -> Result<IBusComponent> {
    let exe = std::env::current_exe().context("locating the engine executable")?;
    Ok(IBusComponent {
        name: REQUESTED_NAME.to_owned(),
        description: "M17N Component".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        license: "GPL".to_owned(),
        author: AUTHORS.to_owned(),
        homepage: "https://github.com/ibus/ibus-m17n".to_owned(),
        exec: format!("{} --ibus", exe.display()),
        textdomain: "ibus-m17n".to_owned(),
        engines,
    })
}

/// Notify `done` once the bus connection is gone.
async fn watch_disconnect(conn: Connection, done: Arc<Event>) {
    let mut stream = MessageStream::from(conn);
    while let Some(msg) = stream.next().await {
        if let Err(err) = msg {
            warn!("bus error: {}", err);
        }
    }
    info!("disconnected from the bus");
    done.notify(usize::MAX);
}

#[async_std::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    if args.daemonize {
        return daemonize();
    }

    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let library = TableLibrary::new(config.table_dirs(&args.table_dirs));
    info!("searching tables in {:?}", library.dirs());

    if args.list {
        for method in library.list_methods() {
            let title = method.title.as_deref().unwrap_or(&method.name);
            println!("{}\t{} -- {}", method.language, method.name, title);
        }
        return Ok(());
    }
    if args.xml {
        let engines: Vec<IBusEngineDesc> = library.list_methods().iter().map(engine_desc).collect();
        print!("{}", engines_xml(&engines));
        return Ok(());
    }

    let methods = open_methods(&library, &args)?;
    if methods.is_empty() {
        bail!("no input method could be opened");
    }

    let done = Arc::new(Event::new());
    let done_listener = done.listen();
    let registry = FactoryRegistry::new(done.clone());

    let address = get_ibus_address().context("locating ibus-daemon")?;
    info!("connecting to {}", address);
    let mut builder = connection::Builder::address(address)?
        .auth_mechanisms(&[AuthMechanism::External, AuthMechanism::Cookie]);
    if args.ibus {
        builder = builder.name(REQUESTED_NAME)?;
    }

    let mut routes = HashMap::new();
    let mut engines = Vec::new();
    for method in methods {
        let engine_name = method.info().engine_name();
        engines.push(engine_desc(method.info()));
        let style = config.style_for(&engine_name);
        let factory = EngineFactory::new(method, style, registry.clone());
        let path = factory.path()?;
        info!("serving {} at {}", engine_name, path);
        routes.insert(engine_name, path.clone());
        builder = builder.serve_at(path, factory)?;
    }
    let conn = builder
        .serve_at(FACTORY_PATH, Factory::new(routes))?
        .build()
        .await
        .context("connecting to ibus-daemon")?;

    if !args.ibus {
        let component = component(engines)?;
        IBusProxy::new(&conn)
            .await?
            .register_component(&Value::from(&component))
            .await
            .context("registering the component")?;
        info!("registered {}", REQUESTED_NAME);
    }

    async_std::task::spawn(watch_disconnect(conn.clone(), done.clone()));

    done_listener.wait();
    if registry.is_finished() {
        info!("all factories destroyed, exiting");
    } else {
        info!("exiting with {} factories alive", registry.live());
    }
    Ok(())
}
