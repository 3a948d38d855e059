pub mod vitals;
