use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use m17n_lib::registry::parse_engine_name;
use m17n_lib::{FactoryInfo, FactoryRegistry, InputMethod, Session, SessionCounter, SessionStyle};
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::{fdo, interface, ObjectServer};

use crate::engine::M17nEngine;

fn object_path(path: String) -> fdo::Result<OwnedObjectPath> {
    ObjectPath::try_from(path.clone())
        .map(OwnedObjectPath::from)
        .map_err(|_| fdo::Error::BadAddress(path))
}

/// Creates engines for one input method.
pub(crate) struct EngineFactory {
    info: FactoryInfo,
    method: Box<dyn InputMethod>,
    style: SessionStyle,
    sessions: Arc<SessionCounter>,
    registry: Arc<FactoryRegistry>,
    engines: Vec<OwnedObjectPath>,
}

impl EngineFactory {
    pub fn new(
        method: Box<dyn InputMethod>,
        style: SessionStyle,
        registry: Arc<FactoryRegistry>,
    ) -> Self {
        registry.acquire();
        Self {
            info: FactoryInfo::new(method.info()),
            method,
            style,
            sessions: Arc::new(SessionCounter::default()),
            registry,
            engines: Vec::new(),
        }
    }

    pub fn path(&self) -> fdo::Result<OwnedObjectPath> {
        object_path(self.info.factory_path())
    }

    async fn spawn_engine(&mut self, server: &ObjectServer) -> fdo::Result<OwnedObjectPath> {
        let id = self.sessions.open();
        let path = match object_path(self.info.engine_path(id)) {
            Ok(path) => path,
            Err(err) => {
                self.sessions.close();
                return Err(err);
            }
        };
        let session = Session::new(id, self.method.create_context(), self.style);
        let engine = M17nEngine::new(session, self.sessions.clone(), path.clone());
        if let Err(err) = server.at(&path, engine).await {
            self.sessions.close();
            return Err(err.into());
        }
        info!(
            "{}: created engine {} ({} live)",
            self.method.info().engine_name(),
            path,
            self.sessions.live()
        );
        self.engines.push(path.clone());
        Ok(path)
    }
}

#[interface(name = "org.freedesktop.IBus.EngineFactory")]
impl EngineFactory {
    fn get_info(&self) -> Vec<String> {
        self.info.to_vec()
    }

    async fn create_engine(
        &mut self,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> fdo::Result<OwnedObjectPath> {
        debug!("CreateEngine: {}", self.method.info().engine_name());
        self.spawn_engine(server).await
    }

    async fn destroy(&mut self, #[zbus(object_server)] server: &ObjectServer) -> fdo::Result<()> {
        let engine_name = self.method.info().engine_name();
        info!("Destroy: factory {}", engine_name);
        for path in self.engines.drain(..) {
            match server.remove::<M17nEngine, _>(&path).await {
                Ok(_) => self.sessions.close(),
                // Destroyed by its client already.
                Err(zbus::Error::InterfaceNotFound) => {}
                Err(err) => warn!("{}: removing engine {}: {}", engine_name, path, err),
            }
        }
        match self.path() {
            Ok(path) => match server.remove::<EngineFactory, _>(&path).await {
                Ok(_) | Err(zbus::Error::InterfaceNotFound) => {}
                Err(err) => warn!("{}: removing factory {}: {}", engine_name, path, err),
            },
            Err(err) => warn!("{}: {}", engine_name, err),
        }
        self.registry.release();
        info!(
            "{}: factory destroyed ({} left)",
            engine_name,
            self.registry.live()
        );
        Ok(())
    }
}

/// The bus-level factory ibus-daemon asks for engines by registry name.
pub(crate) struct Factory {
    routes: HashMap<String, OwnedObjectPath>,
}

impl Factory {
    pub fn new(routes: HashMap<String, OwnedObjectPath>) -> Self {
        Self { routes }
    }
}

#[interface(name = "org.freedesktop.IBus.Factory")]
impl Factory {
    async fn create_engine(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
        engine_name: &str,
    ) -> fdo::Result<OwnedObjectPath> {
        debug!("CreateEngine: {}", engine_name);
        if parse_engine_name(engine_name).is_none() {
            return Err(fdo::Error::InvalidArgs(format!(
                "malformed engine name {}",
                engine_name
            )));
        }
        let Some(factory_path) = self.routes.get(engine_name) else {
            warn!("no factory for {}", engine_name);
            return Err(fdo::Error::Failed(format!("unknown engine {}", engine_name)));
        };
        let factory = server
            .interface::<_, EngineFactory>(factory_path)
            .await
            .map_err(|_| fdo::Error::Failed(format!("engine {} was destroyed", engine_name)))?;
        let mut factory = factory.get_mut().await;
        factory.spawn_engine(server).await
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::path::Path;
    use std::time::Duration;

    use event_listener::{Event, Listener};
    use m17n_lib::table::{Table, TableMethod};
    use zbus::{connection, Connection, Guid, Message};

    use super::*;

    const ENGINE: &str = "org.freedesktop.IBus.Engine";
    const ENGINE_FACTORY: &str = "org.freedesktop.IBus.EngineFactory";
    const ROUTER: &str = "org.freedesktop.IBus.Factory";
    const ROUTER_PATH: &str = "/org/freedesktop/IBus/Factory";

    /// A connected server and client pair.
    async fn connect() -> (Connection, Connection) {
        let (server, client) = UnixStream::pair().unwrap();
        let guid = Guid::generate();
        let server = async_std::task::spawn(async move {
            connection::Builder::unix_stream(server)
                .server(guid)
                .unwrap()
                .p2p()
                .build()
                .await
                .unwrap()
        });
        let client = connection::Builder::unix_stream(client)
            .p2p()
            .build()
            .await
            .unwrap();
        (server.await, client)
    }

    fn factory(source: &str, registry: Arc<FactoryRegistry>) -> EngineFactory {
        let table = Table::from_yaml(source, Path::new("test.yml")).unwrap();
        EngineFactory::new(
            Box::new(TableMethod::new(table)),
            SessionStyle::default(),
            registry,
        )
    }

    fn pinyin(registry: Arc<FactoryRegistry>) -> EngineFactory {
        factory(
            "language: zh\nname: pinyin\nentries: {zhong: [中, 种]}\n",
            registry,
        )
    }

    async fn serve(server: &Connection, factory: EngineFactory) -> OwnedObjectPath {
        let path = factory.path().unwrap();
        assert!(server.object_server().at(&path, factory).await.unwrap());
        path
    }

    async fn call(
        client: &Connection,
        path: &str,
        iface: &str,
        method: &str,
    ) -> zbus::Result<Message> {
        client
            .call_method(None::<&str>, path, Some(iface), method, &())
            .await
    }

    async fn create_engine(client: &Connection, factory_path: &str) -> OwnedObjectPath {
        let reply = call(client, factory_path, ENGINE_FACTORY, "CreateEngine")
            .await
            .unwrap();
        reply.body().deserialize().unwrap()
    }

    fn error_name(result: zbus::Result<Message>) -> String {
        match result {
            Err(zbus::Error::MethodError(name, _, _)) => name.to_string(),
            other => panic!("expected an error reply, got {:?}", other),
        }
    }

    #[async_std::test]
    async fn factory_reports_its_method() {
        let (server, client) = connect().await;
        let registry = FactoryRegistry::new(Arc::new(Event::new()));
        let path = serve(&server, pinyin(registry)).await;
        assert_eq!(path.as_str(), "/org/freedesktop/IBus/M17N/zh/pinyin/Factory");

        let reply = call(&client, path.as_str(), ENGINE_FACTORY, "GetInfo")
            .await
            .unwrap();
        let info: Vec<String> = reply.body().deserialize().unwrap();
        assert_eq!(info[0], "pinyin");
        assert_eq!(info[1], "zh");
        assert_eq!(info[2], "ibus-m17n");
    }

    #[async_std::test]
    async fn factory_destroy_after_engine_destroy_shuts_down() {
        let (server, client) = connect().await;
        let done = Arc::new(Event::new());
        let listener = done.listen();
        let registry = FactoryRegistry::new(done);
        let path = serve(&server, pinyin(registry.clone())).await;

        let engine = create_engine(&client, path.as_str()).await;
        assert_eq!(engine.as_str(), "/org/freedesktop/IBus/M17N/zh/pinyin/Engine/1");
        call(&client, engine.as_str(), ENGINE, "Destroy").await.unwrap();

        call(&client, path.as_str(), ENGINE_FACTORY, "Destroy")
            .await
            .unwrap();
        assert_eq!(registry.live(), 0);
        assert!(registry.is_finished());
        assert!(listener.wait_timeout(Duration::from_secs(1)).is_some());
        assert_eq!(
            error_name(call(&client, path.as_str(), ENGINE_FACTORY, "GetInfo").await),
            "org.freedesktop.DBus.Error.UnknownObject"
        );
    }

    #[async_std::test]
    async fn factory_destroy_removes_live_engines() {
        let (server, client) = connect().await;
        let done = Arc::new(Event::new());
        let listener = done.listen();
        let registry = FactoryRegistry::new(done);
        let pinyin_path = serve(&server, pinyin(registry.clone())).await;
        let itrans = factory(
            "language: hi\nname: itrans\nentries: {ka: [क]}\n",
            registry.clone(),
        );
        let itrans_path = serve(&server, itrans).await;
        assert_eq!(registry.live(), 2);

        let first = create_engine(&client, pinyin_path.as_str()).await;
        let second = create_engine(&client, pinyin_path.as_str()).await;
        assert_eq!(second.as_str(), "/org/freedesktop/IBus/M17N/zh/pinyin/Engine/2");
        let sessions = server
            .object_server()
            .interface::<_, EngineFactory>(&pinyin_path)
            .await
            .unwrap()
            .get()
            .await
            .sessions
            .clone();
        assert_eq!(sessions.live(), 2);
        call(&client, first.as_str(), ENGINE, "Destroy").await.unwrap();
        assert_eq!(sessions.live(), 1);

        call(&client, pinyin_path.as_str(), ENGINE_FACTORY, "Destroy")
            .await
            .unwrap();
        assert_eq!(
            error_name(call(&client, second.as_str(), ENGINE, "FocusIn").await),
            "org.freedesktop.DBus.Error.UnknownObject"
        );
        assert_eq!(sessions.live(), 0);
        assert_eq!(registry.live(), 1);
        assert!(!registry.is_finished());
        assert!(listener.wait_timeout(Duration::from_millis(50)).is_none());

        call(&client, itrans_path.as_str(), ENGINE_FACTORY, "GetInfo")
            .await
            .unwrap();
    }

    #[async_std::test]
    async fn router_creates_engines_by_name() {
        let (server, client) = connect().await;
        let registry = FactoryRegistry::new(Arc::new(Event::new()));
        let path = serve(&server, pinyin(registry)).await;
        let routes = HashMap::from([("m17n:zh:pinyin".to_owned(), path.clone())]);
        server
            .object_server()
            .at(ROUTER_PATH, Factory::new(routes))
            .await
            .unwrap();

        let route = |name: &'static str| {
            let client = client.clone();
            async move {
                client
                    .call_method(None::<&str>, ROUTER_PATH, Some(ROUTER), "CreateEngine", &name)
                    .await
            }
        };

        let engine: OwnedObjectPath = route("m17n:zh:pinyin")
            .await
            .unwrap()
            .body()
            .deserialize()
            .unwrap();
        assert_eq!(engine.as_str(), "/org/freedesktop/IBus/M17N/zh/pinyin/Engine/1");
        call(&client, engine.as_str(), ENGINE, "FocusIn").await.unwrap();

        assert_eq!(
            error_name(route("bogus").await),
            "org.freedesktop.DBus.Error.InvalidArgs"
        );
        assert_eq!(
            error_name(route("m17n:zh:missing").await),
            "org.freedesktop.DBus.Error.Failed"
        );

        call(&client, path.as_str(), ENGINE_FACTORY, "Destroy")
            .await
            .unwrap();
        assert_eq!(
            error_name(route("m17n:zh:pinyin").await),
            "org.freedesktop.DBus.Error.Failed"
        );
    }
}
