mod chain_tests;
mod vault_tests;
