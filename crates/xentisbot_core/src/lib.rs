pub mod commands;
pub mod config;
pub mod dbstatus;
pub mod dispatch;
pub mod enumeration;
pub mod external;
pub mod glossary;
pub mod ids;
pub mod keymigration;
pub mod millis;
pub mod numbers;
pub mod properties;
pub mod reply;
pub mod runtime;
pub mod schema;
pub mod servers;
pub mod shell;
pub mod store;
pub mod syscode;
pub mod translation;
