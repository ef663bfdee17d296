mod crossmatch_test;
mod json_catalog_test;
mod master_catalog_test;
mod merge_records_test;
