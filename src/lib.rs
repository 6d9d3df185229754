#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			eprintln!($($arg)*);
		}
	}};
}

pub mod boundary;
pub mod buffer;
pub mod calls;
pub mod config;
pub mod hierarchy;
pub mod language;
pub mod locator;
pub mod model;
pub mod scanner;
pub mod server;
pub mod workspace;
