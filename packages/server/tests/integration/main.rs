mod common;
mod store_pg;
