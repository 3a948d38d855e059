pub mod max30102;
