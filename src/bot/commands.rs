use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
        queue_command(),
        clear_command(),
        leave_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos en un servidor específico (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist, o reanuda si está en pausa")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL, URL de playlist o términos de búsqueda",
            )
            .required(false),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y limpia la cola")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Limpia la cola de reproducción")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_set() {
        let names: Vec<String> = all_commands()
            .iter()
            .map(|command| {
                serde_json::to_value(command)
                    .ok()
                    .and_then(|value| value["name"].as_str().map(str::to_string))
                    .unwrap_or_default()
            })
            .collect();

        assert_eq!(
            names,
            vec!["play", "pause", "resume", "skip", "stop", "queue", "clear", "leave"]
        );
    }
}
