// Test entry point for sync tests
// Each module drives the public API against real temporary directories

mod fixtures;

mod compare_tests;
