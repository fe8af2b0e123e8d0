mod collision;
mod movement;
