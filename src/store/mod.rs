//! Record store modules for Supabase integration

pub mod games;
pub mod players;
pub mod supabase;

pub use games::GameStore;
pub use players::PlayerStore;
pub use supabase::SupabaseClient;
