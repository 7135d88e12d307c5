//! Integration tests that replay real-world patch sets against mock bundles.

mod storefront;
