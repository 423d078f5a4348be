mod common;

mod create_index_test;
mod drop_index_test;
mod maintenance_test;
mod update_index_test;
