pub mod distilbert;
