mod index_failpoints_test;
