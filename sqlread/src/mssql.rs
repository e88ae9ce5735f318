//! [`Connector`] for SQL Server, on top of `tiberius`.

use futures::{future::BoxFuture, FutureExt, StreamExt, TryStreamExt};
use tiberius::{AuthMethod, Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use crate::{Connection, ConnectionConfig, Connector, ReadError, RowStream};

const APPLICATION_NAME: &str = "sqlread";

pub struct MssqlConnector {
    config: ConnectionConfig,
}

impl MssqlConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        if config.pooling {
            warn!("connection pooling requested but not supported; every read task opens its own connection");
        }
        Self { config }
    }

    fn tiberius_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        if let Some(instance) = &self.config.instance {
            config.instance_name(instance);
        }
        config.application_name(APPLICATION_NAME);
        if let Some(database) = &self.config.database {
            config.database(database);
        }
        if let Some(user) = &self.config.user {
            config.authentication(AuthMethod::sql_server(
                user,
                self.config.password.as_deref().unwrap_or_default(),
            ));
        }
        if self.config.trust_server_certificate {
            config.trust_cert();
        }
        config
    }
}

impl Connector for MssqlConnector {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, ReadError>> {
        async move {
            let config = self.tiberius_config();
            let tcp = match &self.config.instance {
                Some(instance) => {
                    debug!("resolving instance {instance} on {}", self.config.host);
                    TcpStream::connect_named(&config)
                        .await
                        .map_err(ReadError::connection)?
                }
                None => {
                    let addr = config.get_addr();
                    debug!("connecting to {addr}");
                    TcpStream::connect(&addr)
                        .await
                        .map_err(ReadError::connection)?
                }
            };
            tcp.set_nodelay(true).map_err(ReadError::connection)?;
            let client = Client::connect(config, tcp.compat_write())
                .await
                .map_err(ReadError::connection)?;
            Ok(Box::new(MssqlConnection { client }) as Box<dyn Connection>)
        }
        .boxed()
    }
}

struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
}

impl Connection for MssqlConnection {
    fn query<'a>(&'a mut self, sql: &'a str) -> BoxFuture<'a, Result<RowStream<'a>, ReadError>> {
        async move {
            // no command timeout: a 10M-row range can take minutes
            let stream = self
                .client
                .simple_query(sql)
                .await
                .map_err(ReadError::query)?;
            let rows = stream
                .into_row_stream()
                .map_ok(|_row| ())
                .map_err(ReadError::query);
            Ok(rows.boxed())
        }
        .boxed()
    }
}
