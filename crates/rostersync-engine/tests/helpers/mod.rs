pub mod fake_services;
