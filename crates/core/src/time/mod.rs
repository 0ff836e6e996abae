pub mod ist_market;
