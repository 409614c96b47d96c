use super::Context;

pub fn run(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let owner = ctx.owner()?;
    let mut store = ctx.store()?;
    let removed = store.wipe_owner(&owner)?;
    println!(
        "removed {} events, {} modules, {} module items for {owner}",
        removed.events, removed.modules, removed.items
    );
    Ok(())
}
