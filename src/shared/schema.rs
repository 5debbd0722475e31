diesel::table! {
    companies (id) {
        id -> Uuid,
        name -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Text,
        full_name -> Text,
        email -> Text,
        password_hash -> Text,
        role -> Nullable<Text>,
        manager_id -> Nullable<Uuid>,
        company_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    sessions (token) {
        token -> Uuid,
        user_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    clients (id) {
        id -> Uuid,
        company_id -> Uuid,
        name -> Text,
        tax_id -> Text,
        phone -> Text,
        email -> Text,
        contact_name -> Text,
        contact_phone -> Text,
        contact_email -> Text,
        kind -> Text,
        status -> Text,
        owner_id -> Uuid,
        last_contact_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    leads (id) {
        id -> Uuid,
        company_id -> Uuid,
        name -> Text,
        company_name -> Text,
        phone -> Text,
        whatsapp -> Text,
        email -> Text,
        origin -> Text,
        product_interest -> Text,
        status -> Text,
        notes -> Text,
        owner_id -> Nullable<Uuid>,
        converted_at -> Nullable<Timestamptz>,
        converted_client_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    lead_contacts (id) {
        id -> Uuid,
        lead_id -> Uuid,
        channel -> Text,
        outcome -> Text,
        note -> Text,
        contacted_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    follow_ups (id) {
        id -> Uuid,
        lead_id -> Uuid,
        due_on -> Date,
        description -> Text,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    portfolio_contacts (id) {
        id -> Uuid,
        client_id -> Uuid,
        recorded_by -> Uuid,
        channel -> Text,
        note -> Text,
        next_action_on -> Nullable<Date>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    opportunities (id) {
        id -> Uuid,
        company_id -> Uuid,
        client_id -> Uuid,
        salesperson_id -> Uuid,
        title -> Text,
        stage -> Text,
        estimated_value -> Numeric,
        description -> Text,
        next_action -> Text,
        follow_up_on -> Nullable<Date>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    sales_goals (id) {
        id -> Uuid,
        company_id -> Uuid,
        salesperson_id -> Uuid,
        month -> Int4,
        year -> Int4,
        target_value -> Numeric,
        created_by -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    opportunity_interactions (id) {
        id -> Uuid,
        opportunity_id -> Uuid,
        channel -> Text,
        note -> Text,
        created_by -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    audit_log (id) {
        id -> Uuid,
        user_id -> Nullable<Uuid>,
        action -> Text,
        detail -> Text,
        ip -> Text,
        user_agent -> Text,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(sessions -> users (user_id));
diesel::joinable!(lead_contacts -> leads (lead_id));
diesel::joinable!(follow_ups -> leads (lead_id));
diesel::joinable!(portfolio_contacts -> clients (client_id));
diesel::joinable!(opportunity_interactions -> opportunities (opportunity_id));
diesel::joinable!(opportunities -> clients (client_id));

diesel::allow_tables_to_appear_in_same_query!(
    companies,
    users,
    sessions,
    clients,
    leads,
    lead_contacts,
    follow_ups,
    portfolio_contacts,
    opportunities,
    opportunity_interactions,
    sales_goals,
    audit_log,
);
