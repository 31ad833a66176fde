mod coordinator_tests;
mod fitter_tests;
mod params_tests;
mod parser_tests;
