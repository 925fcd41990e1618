pub mod books;
pub mod reviews;
pub mod users;

use shelf_kernel::ModuleRegistry;

use crate::state::AppState;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) -> anyhow::Result<()> {
    registry.register(users::create_module(state.clone()))?;
    registry.register(books::create_module(state.clone()))?;
    registry.register(reviews::create_module(state.clone()))?;
    Ok(())
}
