mod randomized_test;
mod schema_test;
mod scripted_test;
