pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_users.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_users.sql")),
				"tables/002_sessions.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_sessions.sql")),
				"tables/003_channels.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_channels.sql")),
				"tables/004_team_members.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_team_members.sql")),
				"tables/005_channel_members.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_channel_members.sql")),
				"tables/006_posts.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_posts.sql")),
				"tables/007_file_infos.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_file_infos.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
