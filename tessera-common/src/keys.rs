//! Well-known property keys.

/// Driver identifier for the relational store. Its presence selects the
/// relational strategy.
pub const JDBC_DRIVER: &str = "jdbc.driver";
/// Connection URL handed to the relational driver.
pub const JDBC_URL: &str = "jdbc.url";
pub const JDBC_USERNAME: &str = "jdbc.username";
pub const JDBC_PASSWORD: &str = "jdbc.password";
/// Path of a file whose content is used as the database password.
pub const JDBC_PASSWORD_FILE: &str = "jdbc.password.file";
/// Whether the relational store creates its table when missing. Defaults to `true`.
pub const JDBC_AUTOCREATE_TABLE: &str = "jdbc.autocreate.table";

/// Transport descriptor, e.g. `tcp://broker:61616`. Its presence selects the
/// channel sender strategy.
pub const TRANSPORT_URL: &str = "transport.url";
pub const TRANSPORT_USER: &str = "transport.user";
pub const TRANSPORT_PASSWORD: &str = "transport.password";
/// Path of a file whose content is used as the transport password.
pub const TRANSPORT_PASSWORD_FILE: &str = "transport.password.file";
pub const TRANSPORT_CLIENT_ID: &str = "transport.client.id";
