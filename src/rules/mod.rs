pub mod conditional_format;
